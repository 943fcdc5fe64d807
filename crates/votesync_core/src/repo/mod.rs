//! Storage port and persisted client record.
//!
//! # Responsibility
//! - Define the key/value storage contract the client persists through.
//! - Encode/decode the persisted client record and scan storage for
//!   records written by this application.
//!
//! # Invariants
//! - Storage implementations never interpret values.
//! - Scans skip entries they cannot parse instead of failing.

pub mod persisted_state;
pub mod state_store;
