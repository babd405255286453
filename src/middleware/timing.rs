use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::info;

use crate::core::next::Next;
use crate::core::stage::{Construct, Stage};

/// Shared record of measured durations
///
/// Stage instances are rebuilt on every invoke, so anything that must
/// outlive one run lives behind the `Arc` carried in the stage's arguments.
#[derive(Debug, Clone, Default)]
pub struct TimingLog {
    samples: Arc<Mutex<Vec<Duration>>>,
}

impl TimingLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, duration: Duration) {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
    }

    /// All durations recorded so far, oldest first
    pub fn samples(&self) -> Vec<Duration> {
        self.samples
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Settings for [`TimingStage`]
#[derive(Debug, Clone, Default)]
pub struct TimingConfig {
    label: String,
    threshold: Option<Duration>,
    log: Option<TimingLog>,
}

impl TimingConfig {
    /// Log every run's duration
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            threshold: None,
            log: None,
        }
    }

    /// Only log runs that take at least `threshold`
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Also push every measured duration into `log`
    pub fn record_into(mut self, log: TimingLog) -> Self {
        self.log = Some(log);
        self
    }
}

/// Stage that measures how long the rest of the chain takes
///
/// # Example
///
/// ```ignore
/// use stage_chain::middleware::timing::{TimingConfig, TimingStage};
/// use std::time::Duration;
///
/// // Only log slow runs (> 100ms)
/// chain.add::<TimingStage>(
///     TimingConfig::new("import").with_threshold(Duration::from_millis(100)),
/// );
/// ```
pub struct TimingStage {
    config: TimingConfig,
}

impl TimingStage {
    fn should_log(&self, duration: Duration) -> bool {
        match self.config.threshold {
            Some(threshold) => duration >= threshold,
            None => true,
        }
    }

    fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();
        if micros < 1_000 {
            format!("{micros}µs")
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", duration.as_secs_f64())
        }
    }
}

impl Construct for TimingStage {
    type Args = TimingConfig;

    fn construct(config: &TimingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl<P, R> Stage<P, R> for TimingStage {
    fn call(&mut self, payload: &mut P, mut next: Next<'_, P, R>) -> R {
        let start = Instant::now();
        let result = next.run(payload);
        let duration = start.elapsed();

        if self.should_log(duration) {
            info!(
                label = self.config.label.as_str(),
                elapsed = %Self::format_duration(duration),
                "chain run timed"
            );
        }

        if let Some(log) = &self.config.log {
            log.record(duration);
        }

        result
    }
}
