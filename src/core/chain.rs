use std::fmt;
use std::slice;

use tracing::{debug, trace};

use crate::core::chain_error::ChainError;
use crate::core::entry::Entry;
use crate::core::next::Next;
use crate::core::stage::{BoxedStage, Construct, Stage, StageId};

/// What happens to an already registered stage moved by
/// [`insert_before_with`](Chain::insert_before_with) or
/// [`insert_after_with`](Chain::insert_after_with)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Relocation {
    /// Keep the arguments the stage was first registered with and ignore
    /// the ones passed to the insert call
    #[default]
    KeepArgs,
    /// Replace the stored arguments with the ones passed to the insert call
    ReplaceArgs,
}

/// Ordered chain of middleware stages
///
/// Holds one [`Entry`] per stage type. Entries are recipes, not instances:
/// every [`invoke`](Self::invoke) builds a fresh instance of each stage, so
/// no state leaks from one run into the next.
///
/// # Execution Order
///
/// Stages run in registration order, each one wrapped around everything
/// registered after it:
///
/// ```text
/// Audit (before)
///   → Timing (before)
///     → final action
///   ← Timing (after)
/// ← Audit (after)
/// ```
///
/// A stage that returns without running its [`Next`] stops the run: later
/// stages and the final action never execute.
///
/// # Example
///
/// ```ignore
/// let mut chain: Chain<Job, Result<(), JobError>> = Chain::new();
/// chain.add::<Audit>(AuditConfig::default());
/// chain.add::<Timing>(());
/// chain.insert_before::<Timing, Retry>(3);  // Audit, Retry, Timing
///
/// let result = chain.invoke(&mut job, |job| job.perform());
/// ```
pub struct Chain<P, R = ()> {
    entries: Vec<Entry<P, R>>,
}

impl<P, R> Chain<P, R> {
    /// Create a new empty chain
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Create a chain and hand it to `configure` for initial population
    ///
    /// # Example
    ///
    /// ```ignore
    /// let chain = Chain::build(|chain| {
    ///     chain.add::<Audit>(AuditConfig::default());
    ///     chain.add::<Timing>(());
    /// });
    /// ```
    pub fn build(configure: impl FnOnce(&mut Self)) -> Self {
        let mut chain = Self::new();
        configure(&mut chain);
        chain
    }

    /// Run a configuration callback against an existing chain
    pub fn configure(&mut self, configure: impl FnOnce(&mut Self)) -> &mut Self {
        configure(self);
        self
    }

    /// Append a stage (fluent API - consumes self)
    ///
    /// Same semantics as [`add`](Self::add).
    pub fn with<S>(mut self, args: S::Args) -> Self
    where
        S: Construct + Stage<P, R>,
    {
        self.add::<S>(args);
        self
    }

    /// Append stage `S` built from `args`
    ///
    /// Does nothing if `S` is already registered: neither its position nor
    /// its stored arguments change.
    pub fn add<S>(&mut self, args: S::Args) -> &mut Self
    where
        S: Construct + Stage<P, R>,
    {
        if self.exists::<S>() {
            debug!(stage = StageId::of::<S>().name(), "stage already registered, add ignored");
            return self;
        }
        debug!(stage = StageId::of::<S>().name(), "stage added");
        self.entries.push(Entry::new::<S>(args));
        self
    }

    /// Like [`add`](Self::add), but fails if `S` is already registered
    pub fn try_add<S>(&mut self, args: S::Args) -> Result<&mut Self, ChainError>
    where
        S: Construct + Stage<P, R>,
    {
        if self.exists::<S>() {
            return Err(ChainError::AlreadyRegistered {
                stage: StageId::of::<S>(),
            });
        }
        Ok(self.add::<S>(args))
    }

    /// Insert stage `S` at the front of the chain, no-op if already registered
    pub fn prepend<S>(&mut self, args: S::Args) -> &mut Self
    where
        S: Construct + Stage<P, R>,
    {
        if self.exists::<S>() {
            debug!(stage = StageId::of::<S>().name(), "stage already registered, prepend ignored");
            return self;
        }
        debug!(stage = StageId::of::<S>().name(), "stage prepended");
        self.entries.insert(0, Entry::new::<S>(args));
        self
    }

    /// Remove stage `S`, no-op if absent
    pub fn remove<S: 'static>(&mut self) -> &mut Self {
        self.remove_id(StageId::of::<S>())
    }

    /// Remove every entry with the given id
    pub fn remove_id(&mut self, id: StageId) -> &mut Self {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id() != id);
        if self.entries.len() != before {
            debug!(stage = id.name(), "stage removed");
        }
        self
    }

    /// Whether stage `S` is registered
    pub fn exists<S: 'static>(&self) -> bool {
        self.contains_id(StageId::of::<S>())
    }

    /// Whether a stage with the given id is registered
    pub fn contains_id(&self, id: StageId) -> bool {
        self.position(id).is_some()
    }

    /// Place `New` immediately before `Old`
    ///
    /// If `New` is already registered it is moved and keeps its original
    /// arguments; `args` is ignored in that case. If `Old` is not
    /// registered, `New` goes to the front of the chain.
    pub fn insert_before<Old, New>(&mut self, args: New::Args) -> &mut Self
    where
        Old: 'static,
        New: Construct + Stage<P, R>,
    {
        self.insert_before_with::<Old, New>(args, Relocation::KeepArgs)
    }

    /// [`insert_before`](Self::insert_before) with an explicit relocation mode
    pub fn insert_before_with<Old, New>(
        &mut self,
        args: New::Args,
        relocation: Relocation,
    ) -> &mut Self
    where
        Old: 'static,
        New: Construct + Stage<P, R>,
    {
        let entry = self.detach_or_create::<New>(args, relocation);
        let index = self.position(StageId::of::<Old>()).unwrap_or(0);
        debug!(
            stage = entry.name(),
            anchor = StageId::of::<Old>().name(),
            index,
            "stage inserted before anchor"
        );
        self.entries.insert(index, entry);
        self
    }

    /// Place `New` immediately after `Old`
    ///
    /// If `New` is already registered it is moved and keeps its original
    /// arguments; `args` is ignored in that case. If `Old` is not
    /// registered, `New` goes to the end of the chain.
    pub fn insert_after<Old, New>(&mut self, args: New::Args) -> &mut Self
    where
        Old: 'static,
        New: Construct + Stage<P, R>,
    {
        self.insert_after_with::<Old, New>(args, Relocation::KeepArgs)
    }

    /// [`insert_after`](Self::insert_after) with an explicit relocation mode
    pub fn insert_after_with<Old, New>(
        &mut self,
        args: New::Args,
        relocation: Relocation,
    ) -> &mut Self
    where
        Old: 'static,
        New: Construct + Stage<P, R>,
    {
        let entry = self.detach_or_create::<New>(args, relocation);
        let index = self
            .position(StageId::of::<Old>())
            .map_or(self.entries.len(), |anchor| anchor + 1);
        debug!(
            stage = entry.name(),
            anchor = StageId::of::<Old>().name(),
            index,
            "stage inserted after anchor"
        );
        self.entries.insert(index, entry);
        self
    }

    /// Like [`insert_before`](Self::insert_before), but fails instead of
    /// falling back to the front when `Old` is missing
    ///
    /// `Old` must also differ from `New`. The chain is untouched on error.
    pub fn try_insert_before<Old, New>(&mut self, args: New::Args) -> Result<&mut Self, ChainError>
    where
        Old: 'static,
        New: Construct + Stage<P, R>,
    {
        self.check_anchor::<Old, New>()?;
        Ok(self.insert_before::<Old, New>(args))
    }

    /// Like [`insert_after`](Self::insert_after), but fails instead of
    /// falling back to the end when `Old` is missing
    ///
    /// `Old` must also differ from `New`. The chain is untouched on error.
    pub fn try_insert_after<Old, New>(&mut self, args: New::Args) -> Result<&mut Self, ChainError>
    where
        Old: 'static,
        New: Construct + Stage<P, R>,
    {
        self.check_anchor::<Old, New>()?;
        Ok(self.insert_after::<Old, New>(args))
    }

    /// Remove every entry
    pub fn clear(&mut self) -> &mut Self {
        debug!(stages = self.entries.len(), "chain cleared");
        self.entries.clear();
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> slice::Iter<'_, Entry<P, R>> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &[Entry<P, R>] {
        &self.entries
    }

    /// Stage ids in execution order
    pub fn ids(&self) -> Vec<StageId> {
        self.entries.iter().map(Entry::id).collect()
    }

    /// Build one fresh instance per entry, in chain order
    ///
    /// Every call returns new instances; nothing is shared with earlier or
    /// later calls.
    pub fn retrieve(&self) -> Vec<BoxedStage<P, R>> {
        self.entries.iter().map(Entry::make_new).collect()
    }

    /// Run the chain once
    ///
    /// Builds fresh instances via [`retrieve`](Self::retrieve), then enters
    /// each stage in order. `final_action` runs only if every stage runs its
    /// continuation. The returned value is whatever the first stage returns
    /// (or `final_action`, for an empty chain).
    ///
    /// Nothing is caught here: an `Err` returned by a stage or the final
    /// action travels back out through the enclosing stages, and a panic
    /// unwinds through them. The chain's configuration is never modified.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut job = Job::new("resize");
    /// let result = chain.invoke(&mut job, |job| job.perform());
    /// ```
    pub fn invoke<F>(&self, payload: &mut P, mut final_action: F) -> R
    where
        F: FnMut(&mut P) -> R,
    {
        let mut stages = self.retrieve();
        trace!(stages = stages.len(), "invoking chain");
        Next::new(&mut stages, &mut final_action).run(payload)
    }

    fn position(&self, id: StageId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id() == id)
    }

    /// Take `New`'s entry out of the chain, or build one if it is not registered
    fn detach_or_create<New>(&mut self, args: New::Args, relocation: Relocation) -> Entry<P, R>
    where
        New: Construct + Stage<P, R>,
    {
        let Some(index) = self.position(StageId::of::<New>()) else {
            return Entry::new::<New>(args);
        };

        let existing = self.entries.remove(index);
        match relocation {
            Relocation::KeepArgs => {
                debug!(
                    stage = existing.name(),
                    "relocating registered stage, supplied arguments ignored"
                );
                existing
            }
            Relocation::ReplaceArgs => Entry::new::<New>(args),
        }
    }

    fn check_anchor<Old: 'static, New: 'static>(&self) -> Result<(), ChainError> {
        let anchor = StageId::of::<Old>();
        if anchor == StageId::of::<New>() || !self.contains_id(anchor) {
            return Err(ChainError::AnchorNotFound { anchor });
        }
        Ok(())
    }
}

impl<P, R> Default for Chain<P, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, R> Clone for Chain<P, R> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<P, R> fmt::Debug for Chain<P, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("stages", &self.ids())
            .finish()
    }
}

impl<'a, P, R> IntoIterator for &'a Chain<P, R> {
    type Item = &'a Entry<P, R>;
    type IntoIter = slice::Iter<'a, Entry<P, R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
