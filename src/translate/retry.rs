use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::{ServiceError, ServiceErrorKind};

/// Backoff settings for one lemma's translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_initial_delay")]
    pub initial_delay_ms: u64,

    /// Upper bound on a single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Delay multiplier applied after each retry
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Wall-clock budget for all attempts and delays together
    #[serde(default = "default_total_budget")]
    pub total_budget_ms: u64,
}

fn default_max_attempts() -> u32 {
    4
}
fn default_initial_delay() -> u64 {
    500
}
fn default_max_delay() -> u64 {
    8_000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_total_budget() -> u64 {
    30_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            total_budget_ms: default_total_budget(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1 = the first retry).
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let delay = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    pub fn total_budget(&self) -> Duration {
        Duration::from_millis(self.total_budget_ms)
    }
}

/// Why a lemma could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// The service refused with a non-retryable error
    Rejected(ServiceErrorKind),
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: ServiceErrorKind },
    /// The total time budget ran out
    TimedOut,
    /// The service answered with an empty translation
    EmptyGloss,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Rejected(kind) => write!(f, "rejected ({:?})", kind),
            FailureKind::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts (last: {:?})", attempts, last)
            }
            FailureKind::TimedOut => f.write_str("time budget exceeded"),
            FailureKind::EmptyGloss => f.write_str("empty translation"),
        }
    }
}

/// Retry progress for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Init,
    /// Attempt `attempt` is due after `delay`
    Retrying { attempt: u32, delay: Duration },
    Succeeded,
    Failed(FailureKind),
}

impl RetryState {
    /// Advance after the current attempt finished with `outcome`.
    pub fn on_outcome(self, policy: &RetryPolicy, outcome: Result<(), ServiceErrorKind>) -> RetryState {
        let made = match self {
            RetryState::Init => 1,
            RetryState::Retrying { attempt, .. } => attempt,
            terminal => return terminal,
        };

        match outcome {
            Ok(()) => RetryState::Succeeded,
            Err(kind) if !kind.is_retryable() => RetryState::Failed(FailureKind::Rejected(kind)),
            Err(kind) if made >= policy.max_attempts => {
                RetryState::Failed(FailureKind::Exhausted { attempts: made, last: kind })
            }
            Err(_) => RetryState::Retrying {
                attempt: made + 1,
                delay: policy.delay_for_retry(made),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::Failed(_))
    }
}

/// Drive `call` through the retry state machine within the policy's time budget.
///
/// `call` receives the 1-based attempt number. The returned gloss is trimmed.
pub async fn run_with_retry<F, Fut>(policy: &RetryPolicy, call: F) -> Result<String, FailureKind>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String, ServiceError>>,
{
    match tokio::time::timeout(policy.total_budget(), drive(policy, call)).await {
        Ok(result) => result,
        Err(_) => Err(FailureKind::TimedOut),
    }
}

async fn drive<F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<String, FailureKind>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<String, ServiceError>>,
{
    let mut state = RetryState::Init;
    let mut gloss = None;

    loop {
        let attempt = match state {
            RetryState::Init => 1,
            RetryState::Retrying { attempt, delay } => {
                tokio::time::sleep(delay).await;
                attempt
            }
            RetryState::Succeeded => return gloss.ok_or(FailureKind::EmptyGloss),
            RetryState::Failed(kind) => return Err(kind),
        };

        let outcome = match call(attempt).await {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    return Err(FailureKind::EmptyGloss);
                }
                gloss = Some(text.to_string());
                Ok(())
            }
            Err(e) => {
                debug!("Attempt {} failed: {}", attempt, e);
                Err(e.kind())
            }
        };

        state = state.on_outcome(policy, outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 2.0,
            total_budget_ms: 5_000,
        }
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_retry(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_retry(2), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for_retry(4), Duration::from_millis(4_000));
        assert_eq!(policy.delay_for_retry(10), Duration::from_millis(8_000));
    }

    #[test]
    fn test_state_transitions() {
        let policy = fast_policy();
        let state = RetryState::Init.on_outcome(&policy, Err(ServiceErrorKind::Network));
        assert_eq!(
            state,
            RetryState::Retrying { attempt: 2, delay: Duration::from_millis(1) }
        );

        let state = state.on_outcome(&policy, Err(ServiceErrorKind::RateLimit));
        assert!(matches!(state, RetryState::Retrying { attempt: 3, .. }));

        let state = state.on_outcome(&policy, Err(ServiceErrorKind::Network));
        assert_eq!(
            state,
            RetryState::Failed(FailureKind::Exhausted { attempts: 3, last: ServiceErrorKind::Network })
        );
        // terminal states absorb further outcomes
        assert_eq!(state.on_outcome(&policy, Ok(())), state);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let state = RetryState::Init.on_outcome(&fast_policy(), Err(ServiceErrorKind::Quota));
        assert_eq!(state, RetryState::Failed(FailureKind::Rejected(ServiceErrorKind::Quota)));
        assert!(state.is_terminal());
    }

    #[tokio::test]
    async fn test_run_recovers_after_transient_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = run_with_retry(&fast_policy(), move |attempt| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(ServiceError::Network("connection reset".into()))
                } else {
                    Ok(" はかない ".to_string())
                }
            }
        })
        .await;

        assert_eq!(result, Ok("はかない".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_auth() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = run_with_retry(&fast_policy(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err::<String, _>(ServiceError::Auth("403".into())) }
        })
        .await;

        assert_eq!(result, Err(FailureKind::Rejected(ServiceErrorKind::Auth)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_respects_budget() {
        let mut policy = fast_policy();
        policy.total_budget_ms = 20;
        let result = run_with_retry(&policy, |_| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok::<_, ServiceError>("late".to_string())
        })
        .await;
        assert_eq!(result, Err(FailureKind::TimedOut));
    }

    #[tokio::test]
    async fn test_empty_gloss_is_failure() {
        let result = run_with_retry(&fast_policy(), |_| async { Ok::<_, ServiceError>("   ".to_string()) }).await;
        assert_eq!(result, Err(FailureKind::EmptyGloss));
    }
}
