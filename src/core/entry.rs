use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::stage::{BoxedStage, Construct, Stage, StageId};

/// Type-erased constructor for one stage type
trait Factory<P, R>: Send + Sync {
    fn make_new(&self) -> BoxedStage<P, R>;
    fn args(&self) -> &dyn Any;
}

struct TypedFactory<S: Construct> {
    args: S::Args,
    _stage: PhantomData<fn() -> S>,
}

impl<S, P, R> Factory<P, R> for TypedFactory<S>
where
    S: Construct + Stage<P, R>,
{
    fn make_new(&self) -> BoxedStage<P, R> {
        Box::new(S::construct(&self.args))
    }

    fn args(&self) -> &dyn Any {
        &self.args
    }
}

/// A registered stage: its id plus the arguments it is built from
///
/// Entries never change after creation. Moving an entry within a chain keeps
/// the arguments it was registered with.
pub struct Entry<P, R> {
    id: StageId,
    factory: Arc<dyn Factory<P, R>>,
}

impl<P, R> Entry<P, R> {
    /// Register stage type `S` with the arguments it will be built from
    pub fn new<S>(args: S::Args) -> Self
    where
        S: Construct + Stage<P, R>,
    {
        Self {
            id: StageId::of::<S>(),
            factory: Arc::new(TypedFactory::<S> {
                args,
                _stage: PhantomData,
            }),
        }
    }

    pub fn id(&self) -> StageId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    /// Arguments stored for stage type `S`, `None` if this entry is another stage
    pub fn args<S: Construct>(&self) -> Option<&S::Args> {
        if self.id != StageId::of::<S>() {
            return None;
        }
        self.factory.args().downcast_ref::<S::Args>()
    }

    /// Build a fresh stage instance from the stored arguments
    pub fn make_new(&self) -> BoxedStage<P, R> {
        self.factory.make_new()
    }
}

impl<P, R> Clone for Entry<P, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<P, R> fmt::Debug for Entry<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("stage", &self.id.name()).finish()
    }
}
