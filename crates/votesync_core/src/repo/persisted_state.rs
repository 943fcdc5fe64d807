//! Persisted client record codec.
//!
//! # Responsibility
//! - Encode/decode the durable client record stored under one key.
//! - Enumerate client ids of every record tagged with this application.
//!
//! # Invariants
//! - Only identity, votes, sequence number, consent and the application tag
//!   are persisted. Sync status, timers, catalog and confirmation state are
//!   never written.
//! - Scans skip unreadable or foreign entries one by one.

use crate::model::vote::VoteState;
use crate::repo::state_store::{StateStorage, StoreError, StoreResult};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Tag marking records written by this application.
pub const APPLICATION_TAG: &str = "conferenceVoter";

const RECORD_FORMAT_VERSION: u32 = 0;

/// Durable part of the client state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub client_id: Option<String>,
    pub random_value: Option<String>,
    #[serde(default)]
    pub votes: BTreeMap<String, VoteState>,
    #[serde(default)]
    pub last_vote_sequence_number: Option<u64>,
    /// `None` while the consent prompt is still pending.
    #[serde(default)]
    pub is_vote_submission_enabled: Option<bool>,
    #[serde(default = "default_application_name")]
    pub application_name: String,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            client_id: None,
            random_value: None,
            votes: BTreeMap::new(),
            last_vote_sequence_number: None,
            is_vote_submission_enabled: None,
            application_name: default_application_name(),
        }
    }
}

fn default_application_name() -> String {
    APPLICATION_TAG.to_string()
}

/// Stored envelope; the format version is written but not checked on read.
#[derive(Deserialize)]
struct RecordEnvelope {
    state: PersistedState,
}

/// Persisted record errors.
#[derive(Debug)]
pub enum RecordError {
    Store(StoreError),
    Encode(serde_json::Error),
    Decode {
        key: String,
        source: serde_json::Error,
    },
}

impl Display for RecordError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode client record: {err}"),
            Self::Decode { key, source } => {
                write!(f, "failed to decode client record `{key}`: {source}")
            }
        }
    }
}

impl Error for RecordError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::Decode { source, .. } => Some(source),
        }
    }
}

impl From<StoreError> for RecordError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Serializes a record into its stored JSON envelope.
pub fn encode_record(state: &PersistedState) -> Result<String, RecordError> {
    #[derive(Serialize)]
    struct EnvelopeRef<'a> {
        state: &'a PersistedState,
        version: u32,
    }

    serde_json::to_string(&EnvelopeRef {
        state,
        version: RECORD_FORMAT_VERSION,
    })
    .map_err(RecordError::Encode)
}

/// Parses a stored JSON envelope.
pub fn decode_record(raw: &str) -> Result<PersistedState, serde_json::Error> {
    serde_json::from_str::<RecordEnvelope>(raw).map(|envelope| envelope.state)
}

/// Reads the record stored under `key`.
///
/// Returns `Ok(None)` when the key is absent.
pub fn load_record(
    storage: &impl StateStorage,
    key: &str,
) -> Result<Option<PersistedState>, RecordError> {
    let Some(raw) = storage.get_item(key)? else {
        return Ok(None);
    };
    decode_record(&raw)
        .map(Some)
        .map_err(|source| RecordError::Decode {
            key: key.to_string(),
            source,
        })
}

/// Writes the record under `key`, replacing any previous value.
pub fn save_record(
    storage: &impl StateStorage,
    key: &str,
    state: &PersistedState,
) -> Result<(), RecordError> {
    let raw = encode_record(state)?;
    storage.set_item(key, &raw)?;
    Ok(())
}

/// Maps storage key to client id for every record tagged with `tag`.
///
/// Entries that cannot be read or parsed are logged and skipped.
pub fn scan_client_records(
    storage: &impl StateStorage,
    tag: &str,
) -> StoreResult<BTreeMap<String, String>> {
    let mut found = BTreeMap::new();
    for key in storage.keys()? {
        let raw = match storage.get_item(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(err) => {
                warn!("event=record_scan module=repo status=skipped reason=read_failed key={key} error={err}");
                continue;
            }
        };
        let value = match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!("event=record_scan module=repo status=skipped reason=unparseable key={key} error={err}");
                continue;
            }
        };
        let state = value.get("state");
        let tagged = state
            .and_then(|state| state.get("applicationName"))
            .and_then(|name| name.as_str())
            == Some(tag);
        let client_id = state
            .and_then(|state| state.get("clientId"))
            .and_then(|id| id.as_str())
            .filter(|id| !id.is_empty());

        match (tagged, client_id) {
            (true, Some(client_id)) => {
                debug!("event=record_scan module=repo status=found key={key}");
                found.insert(key, client_id.to_string());
            }
            _ => continue,
        }
    }
    Ok(found)
}
