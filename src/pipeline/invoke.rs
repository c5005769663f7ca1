//! Model invocation with bounded retry.
//!
//! ## Retry Strategy
//!
//! Rate limits and transient 5xx errors are frequent on busy completion
//! APIs. The invoker retries those with exponential backoff
//! (`backoff_ms * 2^(attempt-1)`): with the default 2 s base and 3 attempts
//! the wait sequence is 2 s → 4 s, bounding total added delay to under 7 s.
//! Non-transient errors (bad key, invalid request, content filter) propagate
//! on the first attempt; retrying cannot fix them.
//!
//! The invoker holds no state of its own, so a caller may re-invoke the same
//! request after a terminal failure if it chooses to.

use crate::error::DeckScoreError;
use crate::llm::{ChatMessage, Completion, CompletionOptions, CompletionProvider};
use crate::progress::EvaluationProgressCallback;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Retry bounds for one completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Must be >= 1.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles for each later attempt.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    /// Delay inserted before attempt `attempt` (1-based; the first attempt
    /// never waits). Strictly increasing in the attempt number.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms * 2u64.pow(attempt.saturating_sub(2)))
    }
}

/// A completion together with how many attempts it took.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub completion: Completion,
    pub attempts: u32,
}

/// Execute one request, retrying transient failures up to the policy's
/// attempt budget.
///
/// Exhausting the budget surfaces [`DeckScoreError::RateLimitExceeded`];
/// a non-transient failure surfaces immediately as
/// [`DeckScoreError::LlmApi`].
pub async fn invoke(
    provider: &Arc<dyn CompletionProvider>,
    messages: &[ChatMessage],
    options: &CompletionOptions,
    retry: &RetryPolicy,
    progress: &dyn EvaluationProgressCallback,
) -> Result<Invocation, DeckScoreError> {
    for attempt in 1..=retry.max_attempts {
        if attempt > 1 {
            let backoff = retry.backoff_before(attempt);
            warn!(
                "{}: retry {}/{} after {}ms",
                provider.name(),
                attempt,
                retry.max_attempts,
                backoff.as_millis()
            );
            progress.on_retry(attempt, retry.max_attempts, backoff.as_millis() as u64);
            sleep(backoff).await;
        }

        match provider.complete(messages, options).await {
            Ok(completion) => {
                return Ok(Invocation {
                    completion,
                    attempts: attempt,
                })
            }
            Err(e) if e.is_transient() => {
                warn!(
                    "{}: attempt {}/{} failed: {}",
                    provider.name(),
                    attempt,
                    retry.max_attempts,
                    e
                );
            }
            Err(e) => {
                return Err(DeckScoreError::LlmApi {
                    message: e.to_string(),
                })
            }
        }
    }

    Err(DeckScoreError::RateLimitExceeded {
        attempts: retry.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionError;
    use crate::progress::NoopProgressCallback;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given error until `succeed_on`, then succeeds.
    #[derive(Debug)]
    struct FlakyProvider {
        calls: AtomicU32,
        succeed_on: Option<u32>,
        error: fn() -> CompletionError,
    }

    impl FlakyProvider {
        fn always(error: fn() -> CompletionError) -> Self {
            Self {
                calls: AtomicU32::new(0),
                succeed_on: None,
                error,
            }
        }

        fn succeeding_on(succeed_on: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                succeed_on: Some(succeed_on),
                error: || CompletionError::RateLimited {
                    retry_after_secs: None,
                },
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<Completion, CompletionError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(call) == self.succeed_on {
                Ok(Completion {
                    content: format!("ok on {call}"),
                    prompt_tokens: 1,
                    completion_tokens: 1,
                })
            } else {
                Err((self.error)())
            }
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            backoff_ms: 1,
        }
    }

    #[tokio::test]
    async fn always_rate_limited_makes_exactly_max_attempts() {
        let provider = Arc::new(FlakyProvider::always(|| CompletionError::RateLimited {
            retry_after_secs: None,
        }));
        let dyn_provider: Arc<dyn CompletionProvider> = provider.clone();
        let err = invoke(
            &dyn_provider,
            &[ChatMessage::user("x")],
            &CompletionOptions::default(),
            &policy(),
            &NoopProgressCallback,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            DeckScoreError::RateLimitExceeded { attempts: 3 }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn success_on_second_attempt_makes_exactly_two_calls() {
        let provider = Arc::new(FlakyProvider::succeeding_on(2));
        let dyn_provider: Arc<dyn CompletionProvider> = provider.clone();
        let inv = invoke(
            &dyn_provider,
            &[ChatMessage::user("x")],
            &CompletionOptions::default(),
            &policy(),
            &NoopProgressCallback,
        )
        .await
        .unwrap();

        assert_eq!(inv.attempts, 2);
        assert_eq!(inv.completion.content, "ok on 2");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_attempt_success_never_retries() {
        let provider = Arc::new(FlakyProvider::succeeding_on(1));
        let dyn_provider: Arc<dyn CompletionProvider> = provider.clone();
        let inv = invoke(
            &dyn_provider,
            &[ChatMessage::user("x")],
            &CompletionOptions::default(),
            &policy(),
            &NoopProgressCallback,
        )
        .await
        .unwrap();
        assert_eq!(inv.attempts, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_transient_error_propagates_without_retry() {
        let provider = Arc::new(FlakyProvider::always(|| CompletionError::Api {
            detail: "invalid api key".into(),
        }));
        let dyn_provider: Arc<dyn CompletionProvider> = provider.clone();
        let err = invoke(
            &dyn_provider,
            &[ChatMessage::user("x")],
            &CompletionOptions::default(),
            &policy(),
            &NoopProgressCallback,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DeckScoreError::LlmApi { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_strictly_increases() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_ms: 2000,
        };
        let waits: Vec<u64> = (2..=4)
            .map(|a| policy.backoff_before(a).as_millis() as u64)
            .collect();
        assert_eq!(waits, vec![2000, 4000, 8000]);
    }
}
