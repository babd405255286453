//! Stage Chain - an ordered chain of middleware stages with onion-style invocation
//!
//! A [`Chain`] stores one recipe ([`Entry`]) per stage type. Each
//! [`invoke`](Chain::invoke) builds fresh stage instances from those
//! recipes and threads the payload through them: every stage runs its
//! "before" code, hands control to the rest of the chain through [`Next`],
//! then runs its "after" code once the rest has returned.
//!
//! # Quick Start
//!
//! ```
//! use stage_chain::{Chain, Construct, Next, Stage};
//!
//! struct Tag(&'static str);
//!
//! impl Construct for Tag {
//!     type Args = &'static str;
//!
//!     fn construct(name: &&'static str) -> Self {
//!         Tag(*name)
//!     }
//! }
//!
//! impl Stage<Vec<String>, ()> for Tag {
//!     fn call(&mut self, log: &mut Vec<String>, mut next: Next<'_, Vec<String>, ()>) {
//!         log.push(format!("{} before", self.0));
//!         next.run(log);
//!         log.push(format!("{} after", self.0));
//!     }
//! }
//!
//! let chain: Chain<Vec<String>> = Chain::build(|chain| {
//!     chain.add::<Tag>("outer");
//! });
//!
//! let mut log = Vec::new();
//! chain.invoke(&mut log, |log| log.push("work".to_string()));
//! assert_eq!(log, ["outer before", "work", "outer after"]);
//! ```

pub mod core;
pub mod middleware;

// Convenience re-exports
pub use core::chain::{Chain, Relocation};
pub use core::chain_error::ChainError;
pub use core::entry::Entry;
pub use core::next::Next;
pub use core::outcome::Outcome;
pub use core::stage::{BoxedStage, Construct, Stage, StageId};
