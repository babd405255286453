use std::time::Duration;

use tracing::{info, warn};

use crate::core::next::Next;
use crate::core::outcome::Outcome;
use crate::core::stage::{Construct, Stage};

/// Backoff strategy for retry attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// No delay between retries
    #[default]
    None,
    /// Fixed delay between retries
    Fixed(Duration),
    /// Exponential backoff: delay doubles after each retry
    Exponential { initial: Duration, max: Duration },
    /// Linear backoff: delay increases by a fixed amount
    Linear { initial: Duration, increment: Duration },
}

/// Settings for [`RetryStage`]
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffStrategy,
    log_retries: bool,
}

impl RetryPolicy {
    /// Run the remainder at most `max_attempts` times (at least once)
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: BackoffStrategy::None,
            log_retries: true,
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Configure whether to log retry attempts
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_retries = enabled;
        self
    }

    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self::new(max_attempts).with_backoff(BackoffStrategy::Exponential { initial, max })
    }

    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts).with_backoff(BackoffStrategy::Fixed(delay))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let step = attempt.saturating_sub(1);
        match self.backoff {
            BackoffStrategy::None => Duration::ZERO,
            BackoffStrategy::Fixed(delay) => delay,
            BackoffStrategy::Exponential { initial, max } => initial
                .saturating_mul(2u32.saturating_pow(step))
                .min(max),
            BackoffStrategy::Linear { initial, increment } => {
                initial.saturating_add(increment.saturating_mul(step))
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Stage that reruns the rest of the chain while it reports failure
///
/// Every retry runs the same downstream stage instances again, so stages
/// after this one see each attempt. Stages before it run only once.
///
/// # Example
///
/// ```ignore
/// use stage_chain::middleware::retry::{RetryPolicy, RetryStage};
/// use std::time::Duration;
///
/// chain.add::<RetryStage>(RetryPolicy::exponential(
///     5,
///     Duration::from_millis(100),
///     Duration::from_secs(5),
/// ));
/// ```
pub struct RetryStage {
    policy: RetryPolicy,
}

impl Construct for RetryStage {
    type Args = RetryPolicy;

    fn construct(policy: &RetryPolicy) -> Self {
        Self {
            policy: policy.clone(),
        }
    }
}

impl<P, R: Outcome> Stage<P, R> for RetryStage {
    fn call(&mut self, payload: &mut P, mut next: Next<'_, P, R>) -> R {
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = next.run(payload);

            let Some(err) = result.failure() else {
                if attempt > 1 && self.policy.log_retries {
                    info!(attempt, "chain succeeded after retrying");
                }
                return result;
            };

            if attempt >= self.policy.max_attempts {
                if self.policy.log_retries {
                    warn!(attempt, error = %err, "chain failed, giving up");
                }
                return result;
            }

            let delay = self.policy.delay_after(attempt);
            if self.policy.log_retries {
                warn!(
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    ?delay,
                    error = %err,
                    "chain failed, retrying"
                );
            }

            if !delay.is_zero() {
                std::thread::sleep(delay);
            }
        }
    }
}
