use thiserror::Error;

use crate::core::stage::StageId;

/// Errors from the checked configuration operations (`try_*`) of a chain
///
/// The unchecked operations never fail: they skip duplicates and fall back
/// to the front or back of the chain when the anchor is missing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("stage {stage} is already registered")]
    AlreadyRegistered { stage: StageId },

    #[error("anchor stage {anchor} is not in the chain")]
    AnchorNotFound { anchor: StageId },
}
