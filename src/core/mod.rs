pub mod chain;
pub mod chain_error;
pub mod entry;
pub mod next;
pub mod outcome;
pub mod stage;
