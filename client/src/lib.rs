pub use termination::{create_termination, Interrupted, Terminator};

/// Client side state store which owns the broker connection and folds
/// server events into a local copy of the room state
pub mod state_store;
/// Interrupt plumbing to shut the state store down gracefully
pub mod termination;
