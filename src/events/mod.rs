/// Observer hooks into the drain lifecycle
pub mod chain_observer;
