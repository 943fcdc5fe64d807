//! Client-side synchronization engine.
//!
//! # Responsibility
//! - Merge version-stamped submission diffs into the local catalog.
//! - Debounce, dispatch and retry vote uploads with at most one in flight.
//! - Gate uploads on the user's consent decision.
//!
//! # Invariants
//! - Execution is single-threaded; every handler runs to completion.
//! - Timers are owned by the engine and driven by an injected `Clock`.

pub mod catalog;
pub mod clock;
pub mod consent;
pub mod engine;
pub mod timer;
pub mod wire;
