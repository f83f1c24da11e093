//! Redis lock backend using SET NX.

use std::time::Duration;

use fred::prelude::*;
use fred::types::CustomCommand;
use named_lock_core::backend::{ExpirationSetting, LockBackend, LockExpiration};
use named_lock_core::error::{LockError, LockResult};
use tracing::{debug, instrument};

use crate::script::RELEASE_SCRIPT_LUA;

/// Default prefix prepended to lock names to form keys.
pub const DEFAULT_KEY_PREFIX: &str = "lock:";

/// Most a lock key may live: 365 days.
pub const MAX_EXPIRATION: Duration = Duration::from_secs(365 * 24 * 3600);

/// A lock backend storing one key per held lock.
///
/// The key holds this backend's holder id, so a release never deletes a
/// lock taken by someone else. Keys can carry an expiration, see
/// [`LockExpiration`].
pub struct RedisLockBackend {
    client: RedisClient,
    key_prefix: String,
    holder: String,
    expiration: ExpirationSetting,
}

impl RedisLockBackend {
    /// Creates a backend over a connected client with default options.
    pub fn new(client: RedisClient) -> Self {
        Self::builder(client).build()
    }

    /// Connects to `url` and creates a backend with default options.
    pub async fn connect(url: &str) -> LockResult<Self> {
        let config = RedisConfig::from_url(url).map_err(|e| {
            LockError::Connection(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid Redis URL: {e}"),
            )))
        })?;

        let client = RedisClient::new(config, None, None, None);
        client.connect();
        client
            .wait_for_connect()
            .await
            .map_err(LockError::connection)?;

        Ok(Self::new(client))
    }

    /// Returns a new builder for configuring the backend.
    pub fn builder(client: RedisClient) -> RedisLockBackendBuilder {
        RedisLockBackendBuilder {
            client,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            expiration: Duration::ZERO,
        }
    }

    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    /// Value written into every key this backend sets.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Redis key used for `name`.
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.key_prefix, name)
    }
}

/// Generates a holder id: `{process_id}_{random}`.
fn create_holder_id() -> String {
    format!("{}_{:016x}", std::process::id(), rand::random::<u64>())
}

impl LockBackend for RedisLockBackend {
    const NAME: &'static str = "redis";

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn attempt_grant(&self, name: &str) -> LockResult<bool> {
        let key = self.key(name);
        let expiry = self
            .expiration
            .ttl()
            .map(|ttl| Expiration::PX(ttl.as_millis() as i64));

        let set: Option<String> = self
            .client
            .set(&key, &self.holder, expiry, Some(SetOptions::NX), false)
            .await
            .map_err(LockError::connection)?;
        if set.is_some() {
            return Ok(true);
        }

        // The key exists; it may still be ours from an earlier grant.
        let current: Option<String> = self
            .client
            .get(&key)
            .await
            .map_err(LockError::connection)?;
        Ok(current.as_deref() == Some(self.holder.as_str()))
    }

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn release(&self, name: &str) -> LockResult<bool> {
        let args: Vec<RedisValue> = vec![
            RELEASE_SCRIPT_LUA.into(),
            1_i64.into(), // numkeys
            self.key(name).into(),
            self.holder.clone().into(),
        ];
        let cmd = CustomCommand::new_static("EVAL", None, false);

        let result: i64 = self
            .client
            .custom(cmd, args)
            .await
            .map_err(LockError::connection)?;

        match result {
            1 => Ok(true),
            0 => {
                debug!("no such lock, nothing to release");
                Ok(true)
            }
            -1 => Ok(false),
            other => Err(LockError::backend(format!(
                "unexpected release script result: {other}"
            ))),
        }
    }

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn query(&self, name: &str) -> LockResult<bool> {
        let count: i64 = self
            .client
            .exists(self.key(name))
            .await
            .map_err(LockError::connection)?;
        Ok(count > 0)
    }

    async fn close(&self) -> LockResult<()> {
        self.client.quit().await.map_err(LockError::connection)
    }
}

impl LockExpiration for RedisLockBackend {
    const MAX_EXPIRATION: Duration = MAX_EXPIRATION;

    fn set_expiration(&self, expiration: Duration) -> Duration {
        self.expiration.set(expiration)
    }

    fn expiration(&self) -> Duration {
        self.expiration.get()
    }
}

/// Builder for [`RedisLockBackend`] configuration.
pub struct RedisLockBackendBuilder {
    client: RedisClient,
    key_prefix: String,
    expiration: Duration,
}

impl RedisLockBackendBuilder {
    /// Sets the prefix prepended to lock names (default `"lock:"`).
    pub fn key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the initial expiration (zero means never, capped at 365 days).
    pub fn expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn build(self) -> RedisLockBackend {
        let expiration = ExpirationSetting::new(MAX_EXPIRATION);
        expiration.set(self.expiration);
        RedisLockBackend {
            client: self.client,
            key_prefix: self.key_prefix,
            holder: create_holder_id(),
            expiration,
        }
    }
}
