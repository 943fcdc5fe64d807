//! Domain model for the voting client.
//!
//! # Responsibility
//! - Define the data structures shared by the catalog merger, the vote
//!   engine and the persistence layer.
//!
//! # Invariants
//! - A vote entry is keyed by the submission code it rates.
//! - Client identity never changes once created.

pub mod identity;
pub mod submission;
pub mod vote;
