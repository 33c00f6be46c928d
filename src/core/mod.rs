/// Engine façade and drain process
pub mod chain_engine;

/// Errors raised at the typed and serialized boundaries
pub mod chain_error;

/// Step sequence, cursor and drain state
pub mod chain_store;

/// Single-use continuation handed to handlers
pub mod continuation;

/// Built-in delay step
pub mod delay;

/// Per-event handler lists
pub mod handler_registry;

pub mod payload;

pub mod step;
