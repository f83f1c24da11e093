use std::time::Duration;

/// Default prefix prepended to lock names to form document ids.
pub const DEFAULT_KEY_PREFIX: &str = "lock:";

/// Default collection used by [`MongoLockBackend::from_database`](crate::MongoLockBackend::from_database).
pub const DEFAULT_COLLECTION: &str = "NamedLocks";

/// Most a lock document may live: 30 days.
pub const MAX_EXPIRATION: Duration = Duration::from_secs(2_592_000);

/// How a grant attempt writes the lock document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Claim the document only if it is missing, expired, or already ours,
    /// in a single server-side operation.
    #[default]
    Atomic,
    /// Overwrite the document unconditionally and report success.
    ///
    /// WARNING: not mutually exclusive. Two concurrent grants both succeed
    /// and the last write wins. Kept for compatibility with stores written
    /// by upsert-based lockers.
    Upsert,
}

#[derive(Debug, Clone)]
pub struct MongoLockOptions {
    pub key_prefix: String,
    pub write_mode: WriteMode,
    /// Zero means never.
    pub expiration: Duration,
}

impl Default for MongoLockOptions {
    fn default() -> Self {
        Self {
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            write_mode: WriteMode::default(),
            expiration: Duration::ZERO,
        }
    }
}
