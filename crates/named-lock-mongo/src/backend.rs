use std::time::Duration;

use mongodb::bson::{self, Bson, DateTime, Document, doc};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use named_lock_core::backend::{ExpirationSetting, LockBackend, LockExpiration};
use named_lock_core::error::{LockError, LockResult};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::document::{LockDocument, LockMetadata};
use crate::options::{DEFAULT_COLLECTION, MAX_EXPIRATION, MongoLockOptions, WriteMode};

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

/// A lock backend storing one document per held lock.
///
/// The document id is the key prefix (default `"lock:"`) followed by the lock
/// name; a live document means the lock is held. Documents can carry an
/// expiration, see [`LockExpiration`].
pub struct MongoLockBackend {
    collection: Collection<LockDocument>,
    key_prefix: String,
    write_mode: WriteMode,
    holder: String,
    metadata: LockMetadata,
    expiration: ExpirationSetting,
}

impl MongoLockBackend {
    /// Creates a backend over a ready collection with default options.
    pub fn new(collection: Collection<LockDocument>) -> Self {
        Self::builder(collection).build()
    }

    /// Creates a backend over the default collection of `database`.
    pub fn from_database(database: &Database) -> Self {
        Self::new(database.collection(DEFAULT_COLLECTION))
    }

    /// Returns a new builder for configuring the backend.
    pub fn builder(collection: Collection<LockDocument>) -> MongoLockBackendBuilder {
        MongoLockBackendBuilder {
            collection,
            options: MongoLockOptions::default(),
        }
    }

    pub fn collection(&self) -> &Collection<LockDocument> {
        &self.collection
    }

    pub fn write_mode(&self) -> WriteMode {
        self.write_mode
    }

    /// Id written into every document this backend claims.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Document id used for `name`.
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }

    /// Creates the TTL index that lets the server delete expired documents.
    ///
    /// Expired documents are ignored by every operation whether or not the
    /// index exists; the index only keeps the collection from growing.
    pub async fn ensure_ttl_index(&self) -> LockResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "expiresAt": 1 })
            .options(IndexOptions::builder().expire_after(Duration::ZERO).build())
            .build();
        self.collection
            .create_index(index)
            .await
            .map_err(LockError::connection)?;
        Ok(())
    }

    async fn claim(&self, key: &str) -> LockResult<bool> {
        let metadata = bson::to_bson(&self.metadata)
            .map_err(|e| LockError::Backend(Box::new(e)))?;
        let pipeline = claim_pipeline(&self.holder, self.expiration.ttl(), metadata);

        let result = self
            .collection
            .find_one_and_update(doc! { "_id": key }, pipeline)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        match result {
            Ok(Some(document)) => Ok(document.holder == self.holder),
            Ok(None) => Ok(false),
            // Two upserts raced to insert the same id; the other one won.
            Err(e) if is_duplicate_key(&e) => Ok(false),
            Err(e) => Err(LockError::connection(e)),
        }
    }

    async fn overwrite(&self, key: &str) -> LockResult<bool> {
        let now = DateTime::now();
        let expires_at = match self.expiration.ttl() {
            Some(ttl) => DateTime::from_millis(now.timestamp_millis() + ttl.as_millis() as i64),
            None => DateTime::MAX,
        };
        let document = LockDocument {
            id: key.to_string(),
            holder: self.holder.clone(),
            acquired_at: now,
            expires_at,
            metadata: self.metadata.clone(),
        };

        self.collection
            .replace_one(doc! { "_id": key }, &document)
            .upsert(true)
            .await
            .map_err(LockError::connection)?;
        Ok(true)
    }

    /// The unexpired document for `key`, if any.
    async fn live_document(&self, key: &str) -> LockResult<Option<LockDocument>> {
        self.collection
            .find_one(doc! {
                "_id": key,
                "$expr": { "$gt": ["$expiresAt", "$$NOW"] },
            })
            .await
            .map_err(LockError::connection)
    }
}

/// Update pipeline taking the document when it is missing, expired, or
/// already held by `holder`, and leaving it untouched otherwise.
fn claim_pipeline(holder: &str, ttl: Option<Duration>, metadata: Bson) -> Vec<Document> {
    let claimable = doc! {
        "$or": [
            { "$lte": [{ "$ifNull": ["$expiresAt", DateTime::from_millis(0)] }, "$$NOW"] },
            { "$eq": ["$holder", { "$literal": holder }] },
        ]
    };

    let expires_at: Bson = match ttl {
        Some(ttl) => doc! {
            "$dateAdd": {
                "startDate": "$$NOW",
                "unit": "second",
                "amount": ttl.as_secs() as i64,
            }
        }
        .into(),
        None => Bson::DateTime(DateTime::MAX),
    };

    vec![doc! {
        "$set": {
            "holder": { "$cond": [&claimable, { "$literal": holder }, "$holder"] },
            "expiresAt": { "$cond": [&claimable, expires_at, "$expiresAt"] },
            "acquiredAt": { "$cond": [&claimable, "$$NOW", "$acquiredAt"] },
            "metadata": { "$cond": [&claimable, { "$literal": metadata }, "$metadata"] },
        }
    }]
}

fn is_duplicate_key(error: &MongoError) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

impl LockBackend for MongoLockBackend {
    const NAME: &'static str = "mongo";

    #[instrument(skip_all, fields(lock.name = %name, write_mode = ?self.write_mode))]
    async fn attempt_grant(&self, name: &str) -> LockResult<bool> {
        let key = self.key(name);
        match self.write_mode {
            WriteMode::Atomic => self.claim(&key).await,
            WriteMode::Upsert => self.overwrite(&key).await,
        }
    }

    #[instrument(skip_all, fields(lock.name = %name, write_mode = ?self.write_mode))]
    async fn release(&self, name: &str) -> LockResult<bool> {
        let key = self.key(name);
        let filter = match self.write_mode {
            WriteMode::Atomic => doc! { "_id": &key, "holder": &self.holder },
            WriteMode::Upsert => doc! { "_id": &key },
        };

        let deleted = self
            .collection
            .delete_one(filter)
            .await
            .map_err(LockError::connection)?
            .deleted_count;
        if deleted > 0 || self.write_mode == WriteMode::Upsert {
            return Ok(true);
        }

        match self.live_document(&key).await? {
            Some(document) => {
                debug!(holder = %document.holder, "lock held by another holder");
                Ok(false)
            }
            None => Ok(true),
        }
    }

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn query(&self, name: &str) -> LockResult<bool> {
        Ok(self.live_document(&self.key(name)).await?.is_some())
    }
}

impl LockExpiration for MongoLockBackend {
    const MAX_EXPIRATION: Duration = MAX_EXPIRATION;

    fn set_expiration(&self, expiration: Duration) -> Duration {
        self.expiration.set(expiration)
    }

    fn expiration(&self) -> Duration {
        self.expiration.get()
    }
}

/// Builder for [`MongoLockBackend`] configuration.
pub struct MongoLockBackendBuilder {
    collection: Collection<LockDocument>,
    options: MongoLockOptions,
}

impl MongoLockBackendBuilder {
    /// Sets the prefix prepended to lock names (default `"lock:"`).
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.key_prefix = prefix.into();
        self
    }

    /// Sets how grant attempts write the lock document.
    pub fn write_mode(mut self, mode: WriteMode) -> Self {
        self.options.write_mode = mode;
        self
    }

    /// Sets the initial expiration (zero means never, capped at 30 days).
    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.options.expiration = expiration;
        self
    }

    pub fn build(self) -> MongoLockBackend {
        let expiration = ExpirationSetting::new(MAX_EXPIRATION);
        expiration.set(self.options.expiration);
        MongoLockBackend {
            collection: self.collection,
            key_prefix: self.options.key_prefix,
            write_mode: self.options.write_mode,
            holder: Uuid::new_v4().to_string(),
            metadata: LockMetadata::current(),
            expiration,
        }
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Client;
    use mongodb::options::ClientOptions;

    use super::*;

    /// Clients connect lazily, so no server is needed to build one.
    async fn database() -> Database {
        let options = ClientOptions::parse("mongodb://localhost:27017")
            .await
            .unwrap();
        Client::with_options(options)
            .unwrap()
            .database("test_named_locks")
    }

    #[tokio::test]
    async fn test_key_uses_prefix() {
        let database = database().await;
        let backend = MongoLockBackend::from_database(&database);
        assert_eq!(backend.collection().name(), DEFAULT_COLLECTION);
        assert_eq!(backend.key("job-42"), "lock:job-42");

        let backend = MongoLockBackend::builder(database.collection("locks"))
            .key_prefix("app:")
            .build();
        assert_eq!(backend.key("job-42"), "app:job-42");
    }

    #[tokio::test]
    async fn test_atomic_write_is_default() {
        let database = database().await;
        let backend = MongoLockBackend::from_database(&database);
        assert_eq!(backend.write_mode(), WriteMode::Atomic);

        let backend = MongoLockBackend::builder(database.collection("locks"))
            .write_mode(WriteMode::Upsert)
            .build();
        assert_eq!(backend.write_mode(), WriteMode::Upsert);
    }

    #[tokio::test]
    async fn test_holder_ids_are_unique() {
        let database = database().await;
        let a = MongoLockBackend::from_database(&database);
        let b = MongoLockBackend::from_database(&database);
        assert_ne!(a.holder(), b.holder());
    }

    #[tokio::test]
    async fn test_expiration_is_clamped() {
        let database = database().await;
        let backend = MongoLockBackend::builder(database.collection("locks"))
            .expiration(Duration::from_secs(40 * 24 * 3600))
            .build();
        assert_eq!(backend.expiration(), MAX_EXPIRATION);

        assert_eq!(
            backend.set_expiration(Duration::from_secs(90)),
            Duration::from_secs(90)
        );
        assert_eq!(backend.set_expiration(Duration::ZERO), Duration::ZERO);
        assert_eq!(
            backend.set_expiration(MAX_EXPIRATION * 2),
            Duration::from_secs(2_592_000)
        );
    }

    fn set_stage(pipeline: &[Document]) -> &Document {
        pipeline[0].get_document("$set").unwrap()
    }

    #[test]
    fn test_pipeline_sets_every_field() {
        let pipeline = claim_pipeline("me", None, Bson::Null);
        assert_eq!(pipeline.len(), 1);
        let set = set_stage(&pipeline);
        for field in ["holder", "expiresAt", "acquiredAt", "metadata"] {
            assert!(set.contains_key(field), "missing {field}");
        }
    }

    #[test]
    fn test_pipeline_never_expiring_uses_max_date() {
        let pipeline = claim_pipeline("me", None, Bson::Null);
        let cond = set_stage(&pipeline)
            .get_document("expiresAt")
            .unwrap()
            .get_array("$cond")
            .unwrap();
        assert_eq!(cond[1], Bson::DateTime(DateTime::MAX));
    }

    #[test]
    fn test_pipeline_expiring_adds_seconds() {
        let pipeline = claim_pipeline("me", Some(Duration::from_secs(90)), Bson::Null);
        let cond = set_stage(&pipeline)
            .get_document("expiresAt")
            .unwrap()
            .get_array("$cond")
            .unwrap();
        let date_add = cond[1].as_document().unwrap().get_document("$dateAdd").unwrap();
        assert_eq!(date_add.get_i64("amount").unwrap(), 90);
        assert_eq!(date_add.get_str("unit").unwrap(), "second");
    }

    #[test]
    fn test_pipeline_holder_is_literal() {
        let pipeline = claim_pipeline("$holder", None, Bson::Null);
        let cond = set_stage(&pipeline)
            .get_document("holder")
            .unwrap()
            .get_array("$cond")
            .unwrap();
        assert_eq!(
            cond[1].as_document().unwrap().get_str("$literal").unwrap(),
            "$holder"
        );
    }

    #[test]
    fn test_metadata_describes_current_process() {
        assert_eq!(LockMetadata::current().pid, std::process::id());
    }
}
