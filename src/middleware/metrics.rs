use std::fmt::Write as _;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use hashbrown::HashMap;

use crate::core::next::Next;
use crate::core::outcome::Outcome;
use crate::core::stage::{Construct, Stage};

/// Statistics for one label
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionMetrics {
    pub label: String,
    pub total_runs: u64,
    pub successful_runs: u64,
    pub failed_runs: u64,
    pub total_duration_micros: u64,
    pub min_duration_micros: u64,
    pub max_duration_micros: u64,
}

impl ExecutionMetrics {
    fn new(label: String) -> Self {
        Self {
            label,
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            total_duration_micros: 0,
            min_duration_micros: u64::MAX,
            max_duration_micros: 0,
        }
    }

    fn record(&mut self, duration_micros: u64, success: bool) {
        self.total_runs = self.total_runs.saturating_add(1);
        if success {
            self.successful_runs = self.successful_runs.saturating_add(1);
        } else {
            self.failed_runs = self.failed_runs.saturating_add(1);
        }

        self.total_duration_micros = self.total_duration_micros.saturating_add(duration_micros);
        self.min_duration_micros = self.min_duration_micros.min(duration_micros);
        self.max_duration_micros = self.max_duration_micros.max(duration_micros);
    }

    /// Get the average run time in microseconds
    pub fn avg_duration_micros(&self) -> u64 {
        if self.total_runs == 0 {
            0
        } else {
            self.total_duration_micros / self.total_runs
        }
    }

    /// Get the success rate as a percentage (0.0 - 100.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            (self.successful_runs as f64 / self.total_runs as f64) * 100.0
        }
    }
}

/// Shared metrics storage, keyed by label
///
/// Cloning is cheap and every clone sees the same data, which is how fresh
/// [`MetricsStage`] instances accumulate into one place across invokes.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    metrics: Arc<Mutex<HashMap<String, ExecutionMetrics>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ExecutionMetrics>> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, label: &str, duration_micros: u64, success: bool) {
        self.lock()
            .entry_ref(label)
            .or_insert_with(|| ExecutionMetrics::new(label.to_string()))
            .record(duration_micros, success);
    }

    /// Get metrics for a specific label
    pub fn get(&self, label: &str) -> Option<ExecutionMetrics> {
        self.lock().get(label).cloned()
    }

    /// All collected metrics, sorted by label
    pub fn all(&self) -> Vec<ExecutionMetrics> {
        let mut all: Vec<_> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.label.cmp(&b.label));
        all
    }

    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Render a summary table of every label
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:<25} {:>10} {:>10} {:>10} {:>12} {:>12} {:>12} {:>10}",
            "Label", "Total", "Success", "Failed", "Avg (µs)", "Min (µs)", "Max (µs)", "Success %"
        );
        let _ = writeln!(out, "{}", "-".repeat(115));

        for metric in self.all() {
            let _ = writeln!(
                out,
                "{:<25} {:>10} {:>10} {:>10} {:>12} {:>12} {:>12} {:>9.1}%",
                metric.label,
                metric.total_runs,
                metric.successful_runs,
                metric.failed_runs,
                metric.avg_duration_micros(),
                metric.min_duration_micros,
                metric.max_duration_micros,
                metric.success_rate()
            );
        }
        out
    }
}

/// Settings for [`MetricsStage`]
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    label: String,
    registry: MetricsRegistry,
}

impl MetricsConfig {
    pub fn new(label: impl Into<String>, registry: MetricsRegistry) -> Self {
        Self {
            label: label.into(),
            registry,
        }
    }
}

/// Stage that records run counts and durations of the rest of the chain
///
/// # Example
///
/// ```ignore
/// use stage_chain::middleware::metrics::{MetricsConfig, MetricsRegistry, MetricsStage};
///
/// let registry = MetricsRegistry::new();
/// chain.add::<MetricsStage>(MetricsConfig::new("emails", registry.clone()));
///
/// chain.invoke(&mut job, |job| job.perform());
///
/// let stats = registry.get("emails");
/// ```
pub struct MetricsStage {
    config: MetricsConfig,
}

impl Construct for MetricsStage {
    type Args = MetricsConfig;

    fn construct(config: &MetricsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl<P, R: Outcome> Stage<P, R> for MetricsStage {
    fn call(&mut self, payload: &mut P, mut next: Next<'_, P, R>) -> R {
        let start = Instant::now();
        let result = next.run(payload);
        let micros = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);

        self.config
            .registry
            .record(&self.config.label, micros, result.is_success());

        result
    }
}
