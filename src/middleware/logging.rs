use tracing::{debug, error, info, warn};

use crate::core::next::Next;
use crate::core::outcome::Outcome;
use crate::core::stage::{Construct, Stage};

/// Logging levels for the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Settings for [`LoggingStage`], stored as its constructor arguments
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    label: String,
    level: LogLevel,
    log_success: bool,
    log_failure: bool,
}

impl LoggingConfig {
    /// Create a new logging config with the specified minimum level
    pub fn new(label: impl Into<String>, level: LogLevel) -> Self {
        Self {
            label: label.into(),
            level,
            log_success: true,
            log_failure: true,
        }
    }

    /// Only log failures of the remainder
    pub fn errors_only(label: impl Into<String>) -> Self {
        Self {
            log_success: false,
            ..Self::new(label, LogLevel::Error)
        }
    }

    pub fn info(label: impl Into<String>) -> Self {
        Self::new(label, LogLevel::Info)
    }

    pub fn debug(label: impl Into<String>) -> Self {
        Self::new(label, LogLevel::Debug)
    }

    /// Configure whether to log successful runs
    pub fn with_success_logging(mut self, enabled: bool) -> Self {
        self.log_success = enabled;
        self
    }

    /// Configure whether to log failed runs
    pub fn with_failure_logging(mut self, enabled: bool) -> Self {
        self.log_failure = enabled;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::info("chain")
    }
}

/// Stage that logs entry into and exit from the rest of the chain
///
/// Works for any payload and any result implementing [`Outcome`]. Output
/// goes through `tracing` with the configured label as a field.
///
/// # Example
///
/// ```ignore
/// use stage_chain::middleware::logging::{LoggingConfig, LoggingStage};
///
/// chain.add::<LoggingStage>(LoggingConfig::info("billing"));
/// ```
pub struct LoggingStage {
    config: LoggingConfig,
}

impl LoggingStage {
    fn log(&self, level: LogLevel, message: &str) {
        if !self.should_log(level) {
            return;
        }

        let label = self.config.label.as_str();
        match level {
            LogLevel::Debug => debug!(label, "{message}"),
            LogLevel::Info => info!(label, "{message}"),
            LogLevel::Warn => warn!(label, "{message}"),
            LogLevel::Error => error!(label, "{message}"),
        }
    }

    fn should_log(&self, level: LogLevel) -> bool {
        level >= self.config.level
    }
}

impl Construct for LoggingStage {
    type Args = LoggingConfig;

    fn construct(config: &LoggingConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl<P, R: Outcome> Stage<P, R> for LoggingStage {
    fn call(&mut self, payload: &mut P, mut next: Next<'_, P, R>) -> R {
        self.log(
            LogLevel::Debug,
            &format!("entering chain, {} stage(s) remaining", next.remaining()),
        );

        let result = next.run(payload);

        match result.failure() {
            None if self.config.log_success => self.log(LogLevel::Info, "chain completed"),
            Some(err) if self.config.log_failure => {
                self.log(LogLevel::Error, &format!("chain failed: {err}"))
            }
            _ => {}
        }

        result
    }
}
