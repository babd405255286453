use std::fmt::Display;

/// Classifies what a chain run returned
///
/// Stages that react to the remainder's result (logging, retry, metrics)
/// are generic over any `R: Outcome`.
pub trait Outcome {
    /// Failure description, `None` when the run succeeded
    fn failure(&self) -> Option<String>;

    fn is_success(&self) -> bool {
        self.failure().is_none()
    }

    fn is_failure(&self) -> bool {
        !self.is_success()
    }
}

impl Outcome for () {
    fn failure(&self) -> Option<String> {
        None
    }
}

impl Outcome for bool {
    fn failure(&self) -> Option<String> {
        (!*self).then(|| "returned false".to_string())
    }
}

impl<T, E: Display> Outcome for Result<T, E> {
    fn failure(&self) -> Option<String> {
        match self {
            Ok(_) => None,
            Err(err) => Some(err.to_string()),
        }
    }

    fn is_success(&self) -> bool {
        self.is_ok()
    }
}
