//! Pseudonymous client identity.
//!
//! # Responsibility
//! - Generate the durable client id and the per-client ordering seed.
//!
//! # Invariants
//! - Both values are generated only when absent; present values are kept.
//! - The seed is independent of the client id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SEED_LEN: usize = 13;

/// Durable pseudonymous identity of one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    /// Opaque client id sent with every upload.
    pub id: String,
    /// Opaque per-client seed mixed into the catalog tie-break hash.
    pub seed: String,
}

impl ClientIdentity {
    /// Completes a partially persisted identity.
    ///
    /// Returns the identity and whether anything had to be generated.
    pub fn complete(id: Option<String>, seed: Option<String>) -> (Self, bool) {
        let mut generated = false;
        let id = match id.filter(|value| !value.is_empty()) {
            Some(value) => value,
            None => {
                generated = true;
                generate_client_id()
            }
        };
        let seed = match seed.filter(|value| !value.is_empty()) {
            Some(value) => value,
            None => {
                generated = true;
                generate_seed()
            }
        };
        (Self { id, seed }, generated)
    }
}

/// Returns a new random client id (UUID v4, hyphenated).
pub fn generate_client_id() -> String {
    Uuid::new_v4().to_string()
}

/// Returns a new random seed string.
pub fn generate_seed() -> String {
    let mut seed = Uuid::new_v4().simple().to_string();
    seed.truncate(SEED_LEN);
    seed
}
