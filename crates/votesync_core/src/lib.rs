//! Client-side vote synchronization for conference voting.
//! This crate is the single source of truth for the sync invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use config::{ClientConfig, ConfigError, ConfirmationConfig, PollConfig, VoteSyncConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::identity::ClientIdentity;
pub use model::submission::{SubmissionPayload, SubmissionRecord};
pub use model::vote::{VoteLedger, VoteState, VoteValue};
pub use repo::persisted_state::{PersistedState, RecordError, APPLICATION_TAG};
pub use repo::state_store::{
    MemoryStateStore, SqliteStateStore, StateStorage, StoreError, StoreResult,
};
pub use service::client::VotingClient;
pub use service::confirmation::{
    ConfirmationAction, ConfirmationError, ConfirmationGate, ConfirmationRequest,
};
pub use service::data_rights::{DataRightsError, DataScope, DestructiveRequest};
pub use sync::catalog::{InitialLoadState, MergeOutcome, SubmissionCatalog};
pub use sync::clock::{Clock, ManualClock, SystemClock};
pub use sync::consent::ConsentState;
pub use sync::engine::{PendingUpload, SyncStatus, UploadTicket, VoteSyncEngine};
pub use sync::wire::{classify_upload_response, SubmissionsResponse, UploadOutcome};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
