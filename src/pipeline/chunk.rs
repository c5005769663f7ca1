//! Token-window chunking for single-pass (non-slide-aware) input.
//!
//! Long deck text that arrives as one blob is split into windows of at most
//! `max_tokens` tokens with `overlap` tokens shared between consecutive
//! windows, so facts straddling a window boundary appear whole in at least
//! one window. Windows are measured in tokenizer units, not characters,
//! because the completion API budgets in tokens.
//!
//! The stride between windows is `max_tokens - overlap`; an overlap equal to
//! or larger than the window would never advance, so that configuration is
//! rejected at construction.

use crate::error::DeckScoreError;
use tiktoken_rs::CoreBPE;

/// Supported tokenizer encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenEncoding {
    /// `o200k_base` — GPT-4o family. (default)
    #[default]
    O200kBase,
    /// `cl100k_base` — GPT-4 / GPT-3.5 family.
    Cl100kBase,
}

impl TokenEncoding {
    pub fn name(self) -> &'static str {
        match self {
            TokenEncoding::O200kBase => "o200k_base",
            TokenEncoding::Cl100kBase => "cl100k_base",
        }
    }

    /// Parse an encoding name, e.g. from a CLI flag.
    pub fn parse(name: &str) -> Result<Self, DeckScoreError> {
        match name {
            "o200k_base" => Ok(TokenEncoding::O200kBase),
            "cl100k_base" => Ok(TokenEncoding::Cl100kBase),
            other => Err(DeckScoreError::InvalidConfig(format!(
                "unknown token encoding '{other}' (expected o200k_base or cl100k_base)"
            ))),
        }
    }

    fn load(self) -> Result<CoreBPE, DeckScoreError> {
        let result = match self {
            TokenEncoding::O200kBase => tiktoken_rs::o200k_base(),
            TokenEncoding::Cl100kBase => tiktoken_rs::cl100k_base(),
        };
        result.map_err(|e| DeckScoreError::Encoding {
            detail: format!("failed to load {} encoding: {e}", self.name()),
        })
    }
}

/// Splits text into overlapping token windows.
pub struct Chunker {
    bpe: CoreBPE,
    max_tokens: usize,
    overlap: usize,
}

impl std::fmt::Debug for Chunker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunker")
            .field("max_tokens", &self.max_tokens)
            .field("overlap", &self.overlap)
            .finish()
    }
}

impl Chunker {
    /// Create a chunker.
    ///
    /// Fails with `InvalidConfig` when `max_tokens` is zero or
    /// `overlap >= max_tokens` (the window would never advance).
    pub fn new(
        encoding: TokenEncoding,
        max_tokens: usize,
        overlap: usize,
    ) -> Result<Self, DeckScoreError> {
        if max_tokens == 0 {
            return Err(DeckScoreError::InvalidConfig(
                "chunk max_tokens must be >= 1".into(),
            ));
        }
        if overlap >= max_tokens {
            return Err(DeckScoreError::InvalidConfig(format!(
                "chunk overlap ({overlap}) must be less than max_tokens ({max_tokens})"
            )));
        }
        Ok(Self {
            bpe: encoding.load()?,
            max_tokens,
            overlap,
        })
    }

    /// Number of tokens the configured encoding assigns to `text`.
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Lazily iterate the token windows of `text`.
    ///
    /// The iterator is finite and restartable (call `chunks` again for a
    /// fresh pass). Each item detokenizes one window; a window that cannot
    /// be turned back into text yields an `Encoding` error.
    pub fn chunks(&self, text: &str) -> Chunks<'_> {
        Chunks {
            bpe: &self.bpe,
            tokens: self.bpe.encode_ordinary(text),
            pos: 0,
            max_tokens: self.max_tokens,
            stride: self.max_tokens - self.overlap,
            done: false,
        }
    }

    /// Collect all windows eagerly.
    pub fn collect_chunks(&self, text: &str) -> Result<Vec<String>, DeckScoreError> {
        self.chunks(text).collect()
    }
}

/// Iterator over the token windows of one text.
pub struct Chunks<'a> {
    bpe: &'a CoreBPE,
    tokens: Vec<u32>,
    pos: usize,
    max_tokens: usize,
    stride: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Result<String, DeckScoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.tokens.len() {
            return None;
        }
        let start = self.pos;
        let end = (start + self.max_tokens).min(self.tokens.len());
        let window = self.tokens[start..end].to_vec();
        // The last window ends exactly at the token stream's end; advancing
        // by stride past it would re-emit covered tokens.
        if end == self.tokens.len() {
            self.done = true;
        } else {
            self.pos += self.stride;
        }
        Some(
            self.bpe
                .decode(window)
                .map_err(|e| DeckScoreError::Encoding {
                    detail: format!("window at token {start} cannot be detokenized: {e}"),
                }),
        )
    }
}
