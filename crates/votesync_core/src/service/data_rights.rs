//! Data export and server-side deletion requests.
//!
//! # Responsibility
//! - Collect the client ids to export or delete, for the current record or
//!   every record this application persisted.
//! - Provide the product messages around destructive actions.
//!
//! # Invariants
//! - Deletion is only offered while uploads are off.
//! - Unreadable records are skipped during collection.

use crate::repo::persisted_state::{scan_client_records, APPLICATION_TAG};
use crate::repo::state_store::{StateStorage, StoreError};
use crate::service::confirmation::{ConfirmationAction, ConfirmationError};
use crate::sync::wire::{
    DeleteAllRequest, DeleteCurrentRequest, ExportRequest, DELETE_ALL_PATH, DELETE_CURRENT_PATH,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const DELETE_CURRENT_MESSAGE: &str = "Are you sure you want to delete all your voting data stored on the server for THIS event? This action cannot be undone. Your local data for this event will remain on your device.";
const DELETE_ALL_MESSAGE: &str = "Are you sure you want to delete all your voting data stored on the server for ALL events associated with this browser? This action cannot be undone. Your local data for ALL detected events will remain on your device.";

/// Which local records a data-rights request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataScope {
    CurrentEvent,
    AllEvents,
}

#[derive(Debug)]
pub enum DataRightsError {
    /// Uploads are enabled or still running.
    SyncActive,
    /// No client id was found for the requested scope.
    NothingToSend,
    /// The confirmation gate refused the action.
    Confirmation(ConfirmationError),
    Store(StoreError),
}

impl Display for DataRightsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SyncActive => write!(
                f,
                "deletion is disabled while vote submission is enabled or syncing"
            ),
            Self::NothingToSend => write!(f, "no relevant event data found locally"),
            Self::Confirmation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DataRightsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Confirmation(err) => Some(err),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfirmationError> for DataRightsError {
    fn from(value: ConfirmationError) -> Self {
        Self::Confirmation(value)
    }
}

impl From<StoreError> for DataRightsError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Confirmed destructive request, serialized as its plain body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DestructiveRequest {
    DeleteCurrent(DeleteCurrentRequest),
    DeleteAll(DeleteAllRequest),
}

impl DestructiveRequest {
    pub fn path(&self) -> &'static str {
        match self {
            Self::DeleteCurrent(_) => DELETE_CURRENT_PATH,
            Self::DeleteAll(_) => DELETE_ALL_PATH,
        }
    }
}

/// Maps storage key to client id for `scope`.
pub fn collect_client_ids(
    storage: &impl StateStorage,
    current_key: &str,
    current_client_id: Option<&str>,
    scope: DataScope,
) -> Result<BTreeMap<String, String>, DataRightsError> {
    let ids = match scope {
        DataScope::CurrentEvent => current_client_id
            .map(|client_id| BTreeMap::from([(current_key.to_string(), client_id.to_string())]))
            .unwrap_or_default(),
        DataScope::AllEvents => scan_client_records(storage, APPLICATION_TAG)?,
    };
    if ids.is_empty() {
        return Err(DataRightsError::NothingToSend);
    }
    Ok(ids)
}

pub fn build_export_request(
    storage: &impl StateStorage,
    current_key: &str,
    current_client_id: Option<&str>,
    scope: DataScope,
) -> Result<ExportRequest, DataRightsError> {
    let events = collect_client_ids(storage, current_key, current_client_id, scope)?;
    Ok(ExportRequest { events })
}

pub fn build_destructive_request(
    storage: &impl StateStorage,
    current_key: &str,
    current_client_id: Option<&str>,
    action: ConfirmationAction,
) -> Result<DestructiveRequest, DataRightsError> {
    match action {
        ConfirmationAction::DeleteCurrentEventData => {
            let client_id = current_client_id.ok_or(DataRightsError::NothingToSend)?;
            Ok(DestructiveRequest::DeleteCurrent(DeleteCurrentRequest {
                client_id: client_id.to_string(),
            }))
        }
        ConfirmationAction::DeleteAllEventData => {
            let client_ids =
                collect_client_ids(storage, current_key, current_client_id, DataScope::AllEvents)?;
            Ok(DestructiveRequest::DeleteAll(DeleteAllRequest { client_ids }))
        }
    }
}

/// Prompt shown while the confirmation gate is open.
pub fn confirmation_message(action: ConfirmationAction) -> &'static str {
    match action {
        ConfirmationAction::DeleteCurrentEventData => DELETE_CURRENT_MESSAGE,
        ConfirmationAction::DeleteAllEventData => DELETE_ALL_MESSAGE,
    }
}

/// User-visible result of a destructive request.
pub fn destructive_outcome_message(action: ConfirmationAction, error: Option<&str>) -> String {
    match (action, error) {
        (_, Some(error)) => format!("Error deleting data: {error}"),
        (ConfirmationAction::DeleteCurrentEventData, None) => {
            "Server data deleted for this event.".to_string()
        }
        (ConfirmationAction::DeleteAllEventData, None) => {
            "Server data deleted for all found events.".to_string()
        }
    }
}
