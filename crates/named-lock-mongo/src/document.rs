use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// The record whose presence means "locked".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockDocument {
    /// Key prefix followed by the lock name.
    #[serde(rename = "_id")]
    pub id: String,

    /// Id of the backend instance holding the lock.
    pub holder: String,

    #[serde(rename = "acquiredAt")]
    pub acquired_at: DateTime,

    /// `DateTime::MAX` for locks that never expire.
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime,

    pub metadata: LockMetadata,
}

/// Who took the lock, for humans inspecting the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockMetadata {
    pub pid: u32,
    pub host: String,
}

impl LockMetadata {
    /// Metadata describing the current process.
    pub fn current() -> Self {
        Self {
            pid: std::process::id(),
            host: hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}
