//! Event Bridge - A sequential, continuation-driven event chain
//!
//! This library queues named, data-bearing steps and dispatches them one at
//! a time to registered handlers. A step completes only when a handler
//! resumes the continuation it was given; its result is threaded into the
//! next step as `prev`. A small context bus broadcasts keyed records to
//! subscribers alongside the chain.
//!
//! # Quick Start
//!
//! ```ignore
//! use event_bridge::{ChainEngine, Payload};
//! use std::time::Duration;
//!
//! let engine = ChainEngine::new();
//! engine.register("greet", |payload, next| {
//!     println!("hello {}", payload.get_str("name").unwrap_or("world"));
//!     next.resume(Payload::new().with("greeted", true));
//! });
//!
//! engine
//!     .enqueue("greet", Payload::new().with("name", "ada"))
//!     .delay(Duration::from_millis(500))
//!     .enqueue("greet", Payload::new());
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod events;
pub mod middleware;

// Convenience re-exports
pub use config::EngineConfig;
pub use context::context_bus::{ContextBus, ContextMap, ContextSubscription, DeferredRemoval};
pub use context::context_record::{ContextRecord, ContextRole};
pub use core::chain_engine::{ChainEngine, Registration};
pub use core::chain_error::ChainError;
pub use core::chain_store::{ChainStats, DrainPhase};
pub use core::continuation::Next;
pub use core::payload::Payload;
pub use core::step::{BatchItem, Step};
pub use events::chain_observer::ChainObserver;
