//! CLI binary for deckscore.
//!
//! A thin shim over the library crate that maps CLI flags to `EvalConfig`
//! and renders the scored rubric.

use anyhow::{Context, Result};
use clap::Parser;
use deckscore::{
    evaluate_slides, evaluate_text, rubric_rows, slides_from_extracted_text, EvalConfig,
    EvaluationProgressCallback, FileUsageGate, ProgressCallback, PromptTemplates, RubricSchema,
    ScoreColor, ScoredRubric, TokenEncoding,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar position per summarization batch,
/// plus a retry warning line whenever the invoker backs off.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Create a callback whose progress-bar length is set dynamically by
    /// `on_evaluation_start` (called after batching, before any model call).
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_evaluation_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading deck…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Switch to the full progress-bar style once we know `total`.
    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>2}/{len} batches  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Summarizing");
    }
}

impl EvaluationProgressCallback for CliProgressCallback {
    fn on_evaluation_start(&self, total_batches: usize) {
        self.activate_bar(total_batches);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Summarizing {total_batches} batch(es)…"))
        ));
    }

    fn on_batch_start(&self, batch_index: usize, _total: usize) {
        self.bar.set_message(format!("batch {}", batch_index + 1));
    }

    fn on_batch_complete(&self, batch_index: usize, total: usize, summary_len: usize) {
        self.bar.println(format!(
            "  {} Batch {:>2}/{:<2}  {}",
            green("✓"),
            batch_index + 1,
            total,
            dim(&format!("{summary_len:>5} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_retry(&self, attempt: u32, max_attempts: u32, backoff_ms: u64) {
        self.bar.println(format!(
            "  {} rate limited — retry {attempt}/{max_attempts} in {:.1}s",
            yellow("⚠"),
            backoff_ms as f64 / 1000.0,
        ));
    }

    fn on_scoring_start(&self) {
        self.bar.set_prefix("Scoring");
        self.bar.set_message("waiting for rubric…");
    }

    fn on_evaluation_complete(&self, total_batches: usize, percentage: f64) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} batches scored — {}",
            green("✔"),
            bold(&total_batches.to_string()),
            bold(&format!("{percentage:.1}%")),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Score a deck from pre-extracted text (one page per form feed, as
  # produced by `pdftotext deck.pdf deck.txt`)
  deckscore deck.txt

  # Read from stdin
  pdftotext deck.pdf - | deckscore -

  # Structured JSON instead of the table
  deckscore --json deck.txt > result.json

  # Treat the input as one blob (token-window chunking, no slide structure)
  deckscore --single-text notes.txt

  # Older float-scored three-group rubric
  deckscore --legacy-schema deck.txt

  # Cap evaluations at 5/day, counted in a JSON file
  deckscore --usage-file ~/.deckscore/usage_log.json --daily-cap 5 deck.txt

SCORING:
  Each of the 4 question groups is assessed across Team, Business Model and
  Traction with a discrete score of 0, 0.5 or 1 plus a one-sentence
  rationale. The total is reported as a percentage of the 12 possible
  points. Scores are colour-coded: 0 red, 0.5 yellow, 1 green.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY       API key for the bundled OpenAI-compatible provider
  DECKSCORE_MODEL      Override model ID
  DECKSCORE_BASE_URL   OpenAI-compatible endpoint (Azure, vLLM, Ollama, …)

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Extract text:    pdftotext deck.pdf deck.txt
  3. Score:           deckscore deck.txt
"#;

/// Score startup pitch decks with a VC-style rubric using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "deckscore",
    version,
    about = "Score startup pitch decks with a VC-style rubric using LLMs",
    long_about = "Summarize a pitch deck batch by batch (each batch's summary carried into the \
next batch's prompt as rolling context), then score the combined summary against a fixed \
team / business model / traction rubric returned as JSON.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Pre-extracted deck text file (form-feed page breaks), or '-' for stdin.
    input: String,

    /// Completion model ID.
    #[arg(long, env = "DECKSCORE_MODEL", default_value = "gpt-4o")]
    model: String,

    /// API key. Falls back to OPENAI_API_KEY.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// OpenAI-compatible endpoint base URL.
    #[arg(long, env = "DECKSCORE_BASE_URL")]
    base_url: Option<String>,

    /// Slides per summarization batch.
    #[arg(long, env = "DECKSCORE_BATCH_SIZE", default_value_t = 10)]
    batch_size: usize,

    /// Treat the input as one text blob: token-window chunking instead of
    /// slide batching.
    #[arg(long)]
    single_text: bool,

    /// Tokenizer encoding for --single-text chunking: o200k_base, cl100k_base.
    #[arg(long, env = "DECKSCORE_ENCODING", default_value = "o200k_base")]
    encoding: String,

    /// Max tokens per chunk window in --single-text mode.
    #[arg(long, env = "DECKSCORE_CHUNK_TOKENS", default_value_t = 3000)]
    chunk_tokens: usize,

    /// Token overlap between consecutive chunk windows.
    #[arg(long, env = "DECKSCORE_CHUNK_OVERLAP", default_value_t = 300)]
    chunk_overlap: usize,

    /// Accept the older float-scored three-group rubric.
    #[arg(long)]
    legacy_schema: bool,

    /// Path to a custom scoring template (must contain {summary}).
    #[arg(long, env = "DECKSCORE_SCORING_TEMPLATE")]
    scoring_template: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DECKSCORE_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DECKSCORE_MAX_COMPLETION_TOKENS")]
    max_completion_tokens: Option<usize>,

    /// Attempts per completion call on transient failure.
    #[arg(long, env = "DECKSCORE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Backoff before the second attempt, in ms (doubles per attempt).
    #[arg(long, env = "DECKSCORE_BACKOFF_MS", default_value_t = 2000)]
    backoff_ms: u64,

    /// JSON file counting evaluations per day; enables the daily cap.
    #[arg(long, env = "DECKSCORE_USAGE_FILE")]
    usage_file: Option<PathBuf>,

    /// Daily evaluation cap (with --usage-file).
    #[arg(long, env = "DECKSCORE_DAILY_CAP", default_value_t = 5)]
    daily_cap: u32,

    /// Output structured JSON (EvaluationOutput) instead of the table.
    #[arg(long, env = "DECKSCORE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DECKSCORE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DECKSCORE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the result.
    #[arg(short, long, env = "DECKSCORE_QUIET")]
    quiet: bool,

    /// Per-completion-call timeout in seconds.
    #[arg(long, env = "DECKSCORE_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read input ───────────────────────────────────────────────────────
    let text = if cli.input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read deck text from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&cli.input)
            .with_context(|| format!("Failed to read deck text from {}", cli.input))?
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn EvaluationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run evaluation ───────────────────────────────────────────────────
    let output = if cli.single_text {
        evaluate_text(&text, &config).await
    } else {
        evaluate_slides(slides_from_extracted_text(&text), &config).await
    };
    let output = match output {
        Ok(output) => output,
        Err(e) => {
            // Each error class renders its own distinct message; keep it
            // verbatim so "try again later" and "this deck could not be
            // read" stay distinguishable.
            eprintln!("{} {e}", red("✗"));
            std::process::exit(1);
        }
    };

    if cli.json {
        let json =
            serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        print_rubric(&output.rubric);
        println!(
            "\n{}  {}/{} points  —  {}",
            bold("Total"),
            output.aggregate.total,
            output.aggregate.max_total,
            bold(&format!("{:.1}%", output.aggregate.percentage)),
        );
        if !cli.quiet {
            eprintln!(
                "   {} tokens in  /  {} tokens out  —  {}ms total",
                dim(&output.stats.total_prompt_tokens.to_string()),
                dim(&output.stats.total_completion_tokens.to_string()),
                output.stats.total_duration_ms,
            );
        }
    }

    Ok(())
}

/// Map CLI args to `EvalConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<EvalConfig> {
    let schema = if cli.legacy_schema {
        RubricSchema::LegacyThreeGroup
    } else {
        RubricSchema::FourGroup
    };

    let mut builder = EvalConfig::builder()
        .batch_size(cli.batch_size)
        .encoding(TokenEncoding::parse(&cli.encoding)?)
        .max_tokens(cli.chunk_tokens)
        .overlap(cli.chunk_overlap)
        .model(cli.model.clone())
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .retry_backoff_ms(cli.backoff_ms)
        .rubric_schema(schema)
        .daily_cap(cli.daily_cap)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url.clone());
    }
    if let Some(n) = cli.max_completion_tokens {
        builder = builder.completion_max_tokens(n);
    }
    if let Some(ref path) = cli.usage_file {
        builder = builder.usage_gate(Arc::new(FileUsageGate::new(path.clone())));
    }
    if let Some(ref path) = cli.scoring_template {
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scoring template from {path:?}"))?;
        let mut templates = PromptTemplates::for_schema(schema);
        templates.scoring_template = template;
        builder = builder.templates(templates);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Render the rubric with colour-coded score cells.
fn print_rubric(rubric: &ScoredRubric) {
    match rubric {
        ScoredRubric::Standard(rubric) => {
            println!(
                "{}",
                bold(&format!(
                    "{:<7} {:<16} {:>5}  Rationale",
                    "Group", "Category", "Score"
                ))
            );
            for row in rubric_rows(rubric) {
                let score = match row.color {
                    ScoreColor::Red => red("  0  "),
                    ScoreColor::Amber => yellow(" 0.5 "),
                    ScoreColor::Green => green("  1  "),
                };
                println!(
                    "{:<7} {:<16} {score}  {}",
                    row.group,
                    row.category.label(),
                    dim(&row.rationale),
                );
            }
            let meta = &rubric.metadata;
            if meta.vc_stage.is_some() || meta.region.is_some() || meta.industry.is_some() {
                println!();
                if let Some(ref s) = meta.vc_stage {
                    println!("{} {s}", bold("Stage:   "));
                }
                if let Some(ref r) = meta.region {
                    println!("{} {r}", bold("Region:  "));
                }
                if let Some(ref i) = meta.industry {
                    println!("{} {i}", bold("Industry:"));
                }
            }
        }
        ScoredRubric::Legacy(legacy) => {
            for (name, map) in [
                ("team", &legacy.team),
                ("business_model", &legacy.business_model),
                ("traction", &legacy.traction),
            ] {
                for (question, score) in map {
                    let cell = if *score >= 0.75 {
                        green(&format!("{score:.2}"))
                    } else if *score >= 0.4 {
                        yellow(&format!("{score:.2}"))
                    } else {
                        red(&format!("{score:.2}"))
                    };
                    println!("{name:<16} {question:<4} {cell}");
                }
            }
            if let Some(ref rationale) = legacy.rationale {
                println!("\n{}", dim(rationale));
            }
        }
    }
}
