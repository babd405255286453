use crate::core::stage::BoxedStage;

/// Continuation handed to each stage: the rest of the chain
///
/// Running it calls the next stage instance, or the chain's final action
/// once every stage has been entered. It can be run more than once; each
/// run drives the same downstream instances again.
pub struct Next<'a, P, R> {
    stages: &'a mut [BoxedStage<P, R>],
    final_action: &'a mut dyn FnMut(&mut P) -> R,
}

impl<'a, P, R> Next<'a, P, R> {
    pub(crate) fn new(
        stages: &'a mut [BoxedStage<P, R>],
        final_action: &'a mut dyn FnMut(&mut P) -> R,
    ) -> Self {
        Self {
            stages,
            final_action,
        }
    }

    /// Resume the remainder of the chain with `payload`
    pub fn run(&mut self, payload: &mut P) -> R {
        match self.stages.split_first_mut() {
            // Base case: every stage continued, run the final action
            None => (self.final_action)(payload),
            Some((stage, rest)) => {
                let next = Next::new(rest, &mut *self.final_action);
                stage.call(payload, next)
            }
        }
    }

    /// Number of stages left before the final action
    pub fn remaining(&self) -> usize {
        self.stages.len()
    }
}
