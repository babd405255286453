use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::core::next::Next;

/// Identifies a stage type inside a [`Chain`](crate::Chain)
///
/// Two ids are equal when they name the same Rust type. The type name is
/// carried only for display and logging.
#[derive(Clone, Copy)]
pub struct StageId {
    type_id: TypeId,
    name: &'static str,
}

impl StageId {
    /// Id of the stage type `S`
    pub fn of<S: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: type_name::<S>(),
        }
    }

    /// Full type name of the stage, e.g. `my_app::stages::Audit`
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, without generic parameters
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl PartialEq for StageId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for StageId {}

impl Hash for StageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StageId({})", self.name)
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Builds a stage instance from the arguments stored at registration time
///
/// The chain keeps `Args` and calls [`construct`](Construct::construct) once
/// per invocation, so every run of the chain sees a brand new instance.
///
/// # Example
///
/// ```
/// use stage_chain::Construct;
///
/// struct Audit {
///     tag: String,
///     seen: usize,
/// }
///
/// impl Construct for Audit {
///     type Args = String;
///
///     fn construct(tag: &String) -> Self {
///         Self { tag: tag.clone(), seen: 0 }
///     }
/// }
/// ```
pub trait Construct: Sized + 'static {
    /// Constructor arguments. Use `()` for stages that take none.
    type Args: Clone + Send + Sync + 'static;

    fn construct(args: &Self::Args) -> Self;
}

/// A unit of behavior wrapped around the remainder of a chain
///
/// `call` receives the payload and a [`Next`] continuation. Code before
/// `next.run(payload)` runs on the way in, code after it runs on the way
/// out. Returning without running `next` stops every stage after this one
/// and the chain's final action.
///
/// # Example
///
/// ```
/// use stage_chain::{Next, Stage};
///
/// struct Trace;
///
/// impl Stage<Vec<&'static str>, ()> for Trace {
///     fn call(&mut self, log: &mut Vec<&'static str>, mut next: Next<'_, Vec<&'static str>, ()>) {
///         log.push("before");
///         next.run(log);
///         log.push("after");
///     }
/// }
/// ```
pub trait Stage<P, R> {
    fn call(&mut self, payload: &mut P, next: Next<'_, P, R>) -> R;
}

/// Boxed stage instance as produced by [`Chain::retrieve`](crate::Chain::retrieve)
pub type BoxedStage<P, R> = Box<dyn Stage<P, R>>;
