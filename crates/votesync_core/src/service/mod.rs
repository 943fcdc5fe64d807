//! Client-facing use cases.
//!
//! # Responsibility
//! - Combine the sync engine and catalog into one client facade.
//! - Gate destructive server requests behind a timed confirmation.

pub mod client;
pub mod confirmation;
pub mod data_rights;
