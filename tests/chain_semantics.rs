//! Invocation semantics: onion ordering, short-circuiting, fresh instances,
//! error and panic propagation.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};

use stage_chain::{Chain, Construct, Next, Stage, StageId};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// TEST STAGES
// ============================================================================

type Log = Vec<String>;

/// Records "<name>-before" and "<name>-after" around the rest of the chain
struct Marker<const N: u8>;

impl<const N: u8> Construct for Marker<N> {
    type Args = ();

    fn construct(_: &()) -> Self {
        Marker
    }
}

impl<const N: u8> Stage<Log, ()> for Marker<N> {
    fn call(&mut self, log: &mut Log, mut next: Next<'_, Log, ()>) {
        log.push(format!("M{N}-before"));
        next.run(log);
        log.push(format!("M{N}-after"));
    }
}

/// Never runs its continuation
struct Gate;

impl Construct for Gate {
    type Args = ();

    fn construct(_: &()) -> Self {
        Gate
    }
}

impl Stage<Log, ()> for Gate {
    fn call(&mut self, log: &mut Log, _next: Next<'_, Log, ()>) {
        log.push("gate-closed".to_string());
    }
}

static SERIAL: AtomicUsize = AtomicUsize::new(0);

/// Each instance takes a unique serial number and counts its own calls
struct Serial {
    serial: usize,
    calls: usize,
}

impl Construct for Serial {
    type Args = ();

    fn construct(_: &()) -> Self {
        Self {
            serial: SERIAL.fetch_add(1, Ordering::SeqCst),
            calls: 0,
        }
    }
}

impl Stage<Vec<(usize, usize)>, ()> for Serial {
    fn call(&mut self, seen: &mut Vec<(usize, usize)>, mut next: Next<'_, Vec<(usize, usize)>, ()>) {
        self.calls += 1;
        seen.push((self.serial, self.calls));
        next.run(seen);
    }
}

struct Job {
    input: String,
}

/// Rejects empty input and bumps the downstream value on the way out
struct Validate;

impl Construct for Validate {
    type Args = ();

    fn construct(_: &()) -> Self {
        Validate
    }
}

impl Stage<Job, Result<u32, String>> for Validate {
    fn call(&mut self, job: &mut Job, mut next: Next<'_, Job, Result<u32, String>>) -> Result<u32, String> {
        if job.input.is_empty() {
            return Err("empty input".to_string());
        }
        let value = next.run(job)?;
        Ok(value + 1)
    }
}

/// Adds a suffix to the job on the way in
struct Suffix;

impl Construct for Suffix {
    type Args = &'static str;

    fn construct(_: &&'static str) -> Self {
        Suffix
    }
}

impl Stage<Job, Result<u32, String>> for Suffix {
    fn call(&mut self, job: &mut Job, mut next: Next<'_, Job, Result<u32, String>>) -> Result<u32, String> {
        job.input.push('!');
        next.run(job)
    }
}

/// Panics instead of continuing
struct Explode;

impl Construct for Explode {
    type Args = ();

    fn construct(_: &()) -> Self {
        Explode
    }
}

impl Stage<Log, ()> for Explode {
    fn call(&mut self, _: &mut Log, _: Next<'_, Log, ()>) {
        panic!("stage exploded");
    }
}

/// Fails while being built
struct Boom;

impl Construct for Boom {
    type Args = ();

    fn construct(_: &()) -> Self {
        panic!("constructor failed");
    }
}

impl Stage<Log, ()> for Boom {
    fn call(&mut self, log: &mut Log, mut next: Next<'_, Log, ()>) {
        next.run(log);
    }
}

/// Runs the remainder twice
struct Twice;

impl Construct for Twice {
    type Args = ();

    fn construct(_: &()) -> Self {
        Twice
    }
}

impl Stage<Log, ()> for Twice {
    fn call(&mut self, log: &mut Log, mut next: Next<'_, Log, ()>) {
        next.run(log);
        next.run(log);
    }
}

type M1 = Marker<1>;
type M2 = Marker<2>;

// ============================================================================
// TESTS
// ============================================================================

#[test]
fn stages_wrap_the_final_action_like_an_onion() {
    init_tracing();
    let chain: Chain<Log> = Chain::build(|chain| {
        chain.add::<M1>(()).add::<M2>(());
    });

    let mut log = Log::new();
    chain.invoke(&mut log, |log| log.push("final".to_string()));

    assert_eq!(log, ["M1-before", "M2-before", "final", "M2-after", "M1-after"]);
}

#[test]
fn stage_that_skips_next_short_circuits_the_rest() {
    init_tracing();
    let chain: Chain<Log> = Chain::new().with::<Gate>(()).with::<M2>(());

    let mut log = Log::new();
    let mut final_ran = false;
    chain.invoke(&mut log, |_| final_ran = true);

    assert_eq!(log, ["gate-closed"]);
    assert!(!final_ran);
}

#[test]
fn every_invoke_gets_fresh_instances() {
    let chain: Chain<Vec<(usize, usize)>> = Chain::new().with::<Serial>(());

    let mut first = Vec::new();
    chain.invoke(&mut first, |_| {});
    let mut second = Vec::new();
    chain.invoke(&mut second, |_| {});

    // each run starts from a new instance whose call count begins at 1
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].1, 1);
    assert_eq!(second[0].1, 1);
    assert_ne!(first[0].0, second[0].0);

    assert_eq!(chain.retrieve().len(), 1);
}

#[test]
fn cleared_chain_only_runs_the_final_action() {
    let mut chain: Chain<Log> = Chain::new().with::<M1>(()).with::<M2>(());
    chain.clear();

    assert!(chain.retrieve().is_empty());

    let mut log = Log::new();
    chain.invoke(&mut log, |log| log.push("final".to_string()));
    assert_eq!(log, ["final"]);
}

#[test]
fn errors_travel_back_through_enclosing_stages() {
    let chain: Chain<Job, Result<u32, String>> =
        Chain::new().with::<Validate>(()).with::<Suffix>("!");

    let mut job = Job {
        input: "resize".to_string(),
    };
    let result = chain.invoke(&mut job, |job| Ok(job.input.len() as u32));
    assert_eq!(result, Ok(8));
    assert_eq!(job.input, "resize!");

    let mut empty = Job { input: String::new() };
    let mut final_ran = false;
    let result = chain.invoke(&mut empty, |_| {
        final_ran = true;
        Ok(0)
    });
    assert_eq!(result, Err("empty input".to_string()));
    assert!(!final_ran);

    let mut job = Job {
        input: "x".to_string(),
    };
    let result = chain.invoke(&mut job, |_| Err("worker crashed".to_string()));
    assert_eq!(result, Err("worker crashed".to_string()));
}

#[test]
fn panic_aborts_the_run_but_keeps_configuration() {
    let chain: Chain<Log> = Chain::new().with::<M1>(()).with::<Explode>(()).with::<M2>(());

    let mut log = Log::new();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        chain.invoke(&mut log, |log| log.push("final".to_string()));
    }));

    assert!(outcome.is_err());
    assert_eq!(log, ["M1-before"]);
    assert_eq!(
        chain.ids(),
        vec![StageId::of::<M1>(), StageId::of::<Explode>(), StageId::of::<M2>()]
    );
}

#[test]
fn constructor_panic_aborts_before_any_stage_runs() {
    let chain: Chain<Log> = Chain::new().with::<M1>(()).with::<Boom>(());

    let mut log = Log::new();
    let mut final_ran = false;
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        chain.invoke(&mut log, |_| final_ran = true);
    }));

    assert!(outcome.is_err());
    // instances are all built before the first stage is entered
    assert!(log.is_empty());
    assert!(!final_ran);
    assert_eq!(chain.ids(), vec![StageId::of::<M1>(), StageId::of::<Boom>()]);
}

#[test]
fn running_next_twice_reruns_the_remainder() {
    let chain: Chain<Log> = Chain::new().with::<Twice>(()).with::<M1>(());

    let mut log = Log::new();
    chain.invoke(&mut log, |log| log.push("final".to_string()));

    assert_eq!(
        log,
        ["M1-before", "final", "M1-after", "M1-before", "final", "M1-after"]
    );
}

#[test]
fn shared_chain_can_be_invoked_from_many_threads() {
    let chain: Chain<Log> = Chain::new().with::<M1>(()).with::<M2>(());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let mut log = Log::new();
                    chain.invoke(&mut log, |log| log.push("final".to_string()));
                    log
                })
            })
            .collect();

        for handle in handles {
            let log = handle.join().unwrap();
            assert_eq!(log, ["M1-before", "M2-before", "final", "M2-after", "M1-after"]);
        }
    });
}

#[test]
fn relocated_stage_keeps_its_first_arguments() {
    let mut chain: Chain<Job, Result<u32, String>> = Chain::new();
    chain.add::<Suffix>("first").add::<Validate>(());
    chain.insert_after::<Validate, Suffix>("second");

    assert_eq!(chain.ids(), vec![StageId::of::<Validate>(), StageId::of::<Suffix>()]);
    assert_eq!(chain.entries()[1].args::<Suffix>(), Some(&"first"));
}
