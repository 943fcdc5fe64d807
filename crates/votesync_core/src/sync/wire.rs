//! JSON payloads exchanged with the voting server.
//!
//! # Responsibility
//! - Define request/response shapes for polling, vote upload, deletion and
//!   export.
//! - Classify transport results into upload outcomes.
//!
//! # Invariants
//! - A vote upload always carries the complete vote map, never a delta.
//! - Only `{"status":"success"}` on a successful transport counts as success.

use crate::model::submission::SubmissionPayload;
use crate::model::vote::VoteState;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SUBMISSIONS_PATH: &str = "/getsubmissions";
pub const SEND_VOTES_PATH: &str = "/sendvotes";
pub const DELETE_CURRENT_PATH: &str = "/delete";
pub const DELETE_ALL_PATH: &str = "/delete-all";
pub const EXPORT_PATH: &str = "/export";

const UPLOAD_SUCCESS_STATUS: &str = "success";

/// Returns the poll path for the next catalog request.
///
/// The first load fetches the full catalog; later polls ask for the diff
/// since `last_version`.
pub fn submissions_path(last_version: Option<i64>) -> String {
    match last_version {
        None => SUBMISSIONS_PATH.to_string(),
        Some(version) => format!("{SUBMISSIONS_PATH}/{version}"),
    }
}

/// Poll response. An absent code means unchanged, `null` means deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionsResponse {
    pub version: i64,
    #[serde(default)]
    pub submissions: BTreeMap<String, Option<SubmissionPayload>>,
}

/// Vote upload body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteUploadRequest {
    pub client_id: String,
    pub sequence_number: Option<u64>,
    pub votes: BTreeMap<String, VoteState>,
}

#[derive(Debug, Deserialize)]
struct UploadAck {
    status: String,
}

/// Result of one vote upload as seen by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Success,
    Failure,
}

/// Maps a transport result to an upload outcome.
///
/// Non-success transport status, unparseable bodies and any status other
/// than `success` are failures.
pub fn classify_upload_response(transport_ok: bool, body: &str) -> UploadOutcome {
    if !transport_ok {
        return UploadOutcome::Failure;
    }
    match serde_json::from_str::<UploadAck>(body) {
        Ok(ack) if ack.status == UPLOAD_SUCCESS_STATUS => UploadOutcome::Success,
        Ok(ack) => {
            warn!(
                "event=vote_upload_response module=sync status=error reason=unexpected_status value={}",
                ack.status
            );
            UploadOutcome::Failure
        }
        Err(err) => {
            warn!("event=vote_upload_response module=sync status=error reason=malformed error={err}");
            UploadOutcome::Failure
        }
    }
}

/// Server-side deletion of this client's data for the current event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCurrentRequest {
    pub client_id: String,
}

/// Server-side deletion for every locally known event record.
///
/// Keys are storage keys, values the client id stored under them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAllRequest {
    pub client_ids: BTreeMap<String, String>,
}

/// Data export request, keyed like `DeleteAllRequest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub events: BTreeMap<String, String>,
}
