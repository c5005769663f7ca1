//! Progress-callback trait for per-batch evaluation events.
//!
//! A deck evaluation can take a minute or more (one completion call per
//! batch plus the scoring call, each with possible backoff waits). Inject an
//! `Arc<dyn EvaluationProgressCallback>` via
//! [`crate::config::EvalConfigBuilder::progress_callback`] to surface
//! live status — a terminal progress bar, a web socket, a log line —
//! without the library knowing how the host application communicates.
//!
//! All methods have default no-op implementations so callers only override
//! what they care about. The pipeline is strictly sequential, so events for
//! one evaluation arrive in order from a single task; `Send + Sync` is still
//! required because the callback is shared through the configuration.

use std::sync::Arc;

/// Called by the pipeline as the evaluation advances.
pub trait EvaluationProgressCallback: Send + Sync {
    /// Called once after batching, before any model call.
    fn on_evaluation_start(&self, total_batches: usize) {
        let _ = total_batches;
    }

    /// Called just before a batch's summarization request is sent.
    /// `batch_index` is 0-based.
    fn on_batch_start(&self, batch_index: usize, total_batches: usize) {
        let _ = (batch_index, total_batches);
    }

    /// Called when a batch summary has been produced.
    fn on_batch_complete(&self, batch_index: usize, total_batches: usize, summary_len: usize) {
        let _ = (batch_index, total_batches, summary_len);
    }

    /// Called before each retry wait inside the invoker.
    fn on_retry(&self, attempt: u32, max_attempts: u32, backoff_ms: u64) {
        let _ = (attempt, max_attempts, backoff_ms);
    }

    /// Called when all batch summaries are in and the scoring call begins.
    fn on_scoring_start(&self) {}

    /// Called once after the rubric has been parsed and aggregated.
    fn on_evaluation_complete(&self, total_batches: usize, percentage: f64) {
        let _ = (total_batches, percentage);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl EvaluationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::EvalConfig`].
pub type ProgressCallback = Arc<dyn EvaluationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        batches: AtomicUsize,
        retries: AtomicUsize,
        scored: AtomicUsize,
    }

    impl EvaluationProgressCallback for TrackingCallback {
        fn on_batch_complete(&self, _i: usize, _n: usize, _len: usize) {
            self.batches.fetch_add(1, Ordering::SeqCst);
        }

        fn on_retry(&self, _attempt: u32, _max: u32, _backoff_ms: u64) {
            self.retries.fetch_add(1, Ordering::SeqCst);
        }

        fn on_scoring_start(&self) {
            self.scored.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_evaluation_start(2);
        cb.on_batch_start(0, 2);
        cb.on_batch_complete(0, 2, 42);
        cb.on_retry(2, 3, 2000);
        cb.on_scoring_start();
        cb.on_evaluation_complete(2, 75.0);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback::default();
        cb.on_batch_complete(0, 2, 100);
        cb.on_batch_complete(1, 2, 80);
        cb.on_retry(2, 3, 2000);
        cb.on_scoring_start();
        assert_eq!(cb.batches.load(Ordering::SeqCst), 2);
        assert_eq!(cb.retries.load(Ordering::SeqCst), 1);
        assert_eq!(cb.scored.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_evaluation_start(5);
        cb.on_batch_start(0, 5);
    }
}
