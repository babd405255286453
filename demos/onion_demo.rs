//! Onion demo: a job-processing chain built from bundled and custom stages
//!
//! Shows configuration through a builder callback, positional insertion,
//! relocation, short-circuiting and the before/after nesting of stages.

use std::time::Duration;

use stage_chain::middleware::logging::{LoggingConfig, LoggingStage};
use stage_chain::middleware::metrics::{MetricsConfig, MetricsRegistry, MetricsStage};
use stage_chain::middleware::retry::{RetryPolicy, RetryStage};
use stage_chain::middleware::timing::{TimingConfig, TimingStage};
use stage_chain::{Chain, Construct, Next, Stage};

#[derive(Debug)]
struct Job {
    name: String,
    queue: &'static str,
    trail: Vec<String>,
}

type JobResult = Result<(), String>;

/// Drops jobs routed to a paused queue
struct PauseGate {
    paused: &'static str,
}

impl Construct for PauseGate {
    type Args = &'static str;

    fn construct(paused: &&'static str) -> Self {
        Self { paused: *paused }
    }
}

impl Stage<Job, JobResult> for PauseGate {
    fn call(&mut self, job: &mut Job, mut next: Next<'_, Job, JobResult>) -> JobResult {
        if job.queue == self.paused {
            job.trail.push(format!("gate: {} skipped", job.name));
            return Ok(());
        }
        next.run(job)
    }
}

/// Records entering and leaving the rest of the chain
struct Trail;

impl Construct for Trail {
    type Args = ();

    fn construct(_: &()) -> Self {
        Trail
    }
}

impl Stage<Job, JobResult> for Trail {
    fn call(&mut self, job: &mut Job, mut next: Next<'_, Job, JobResult>) -> JobResult {
        job.trail.push("trail: before".to_string());
        let result = next.run(job);
        job.trail.push("trail: after".to_string());
        result
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let registry = MetricsRegistry::new();

    let mut chain: Chain<Job, JobResult> = Chain::build(|chain| {
        chain
            .add::<LoggingStage>(LoggingConfig::info("jobs"))
            .add::<MetricsStage>(MetricsConfig::new("jobs", registry.clone()))
            .add::<Trail>(());
    });

    chain.insert_before::<Trail, PauseGate>("reports");
    chain.insert_after::<PauseGate, RetryStage>(RetryPolicy::fixed(3, Duration::from_millis(5)));
    chain.prepend::<TimingStage>(TimingConfig::new("jobs"));

    // already registered: moved, keeps "reports"
    chain.insert_after::<Trail, PauseGate>("emails");

    println!("chain: {chain:?}\n");

    let mut attempts = 0;
    let mut job = Job {
        name: "resize-avatar".to_string(),
        queue: "images",
        trail: Vec::new(),
    };
    let result = chain.invoke(&mut job, |job| {
        attempts += 1;
        job.trail.push(format!("perform: attempt {attempts}"));
        if attempts < 2 {
            Err("storage busy".to_string())
        } else {
            Ok(())
        }
    });
    println!("{} -> {result:?}", job.name);
    for line in &job.trail {
        println!("  {line}");
    }

    let mut report = Job {
        name: "weekly-report".to_string(),
        queue: "reports",
        trail: Vec::new(),
    };
    let result = chain.invoke(&mut report, |_| Ok(()));
    println!("\n{} -> {result:?}", report.name);
    for line in &report.trail {
        println!("  {line}");
    }

    println!("\n{}", registry.summary());
}
