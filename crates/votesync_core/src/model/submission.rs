//! Submission catalog records.

use serde::{Deserialize, Serialize};

/// Submission content as delivered by the poll endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub title: String,
    pub code: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
}

/// Locally known submission.
///
/// `first_observed_version` is fixed at first sight and is the primary
/// ordering key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub title: String,
    pub abstract_text: String,
    pub code: String,
    pub first_observed_version: i64,
}

impl SubmissionRecord {
    /// Builds the record stored under catalog key `code`.
    ///
    /// The key wins over `payload.code` so records and order agree.
    pub fn from_payload(code: &str, payload: &SubmissionPayload, version: i64) -> Self {
        Self {
            title: payload.title.clone(),
            abstract_text: payload.abstract_text.clone(),
            code: code.to_string(),
            first_observed_version: version,
        }
    }

    /// Returns whether the displayed content differs from `payload`.
    pub fn content_differs(&self, payload: &SubmissionPayload) -> bool {
        self.title != payload.title || self.abstract_text != payload.abstract_text
    }
}
