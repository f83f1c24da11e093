//! The contract every storage backend implements.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::warn;

use crate::error::LockResult;

// ============================================================================
// Backend Trait
// ============================================================================

/// Translates the three lock primitives into one backend's native calls.
///
/// Adapters never wait: `attempt_grant` must return as soon as the backend
/// has answered, whatever the contention. Retrying, polling and timeouts
/// belong to [`LockEngine`](crate::engine::LockEngine).
///
/// # Example
///
/// ```rust,ignore
/// struct MyBackend { /* client handle */ }
///
/// impl LockBackend for MyBackend {
///     const NAME: &'static str = "my-store";
///
///     async fn attempt_grant(&self, name: &str) -> LockResult<bool> {
///         self.client.insert_if_absent(name).await.map_err(LockError::connection)
///     }
///
///     async fn release(&self, name: &str) -> LockResult<bool> {
///         // "not found" must count as released
///         Ok(self.client.delete(name).await.map_err(LockError::connection)?.is_some()
///             || !self.client.exists(name).await.map_err(LockError::connection)?)
///     }
///
///     async fn query(&self, name: &str) -> LockResult<bool> {
///         self.client.exists(name).await.map_err(LockError::connection)
///     }
/// }
/// ```
pub trait LockBackend: Send + Sync {
    /// Short backend identifier used in log fields.
    const NAME: &'static str;

    /// Makes a single, non-blocking attempt to create the lock record.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The lock record now belongs to this backend instance
    /// * `Ok(false)` - Someone else holds it
    /// * `Err(...)` - The backend could not be asked
    fn attempt_grant(&self, name: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Removes the lock record.
    ///
    /// Must return `Ok(true)` when the record is already absent. Returns
    /// `Ok(false)` only when the record exists and belongs to someone else.
    fn release(&self, name: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Reports whether the backend currently considers `name` locked, by
    /// anyone. Must not create or remove lock records.
    fn query(&self, name: &str) -> impl Future<Output = LockResult<bool>> + Send;

    /// Called when the engine gives up acquiring `name`.
    ///
    /// Adapters that open per-name resources for an attempt drop them here.
    fn abandon(&self, name: &str) -> impl Future<Output = ()> + Send {
        let _ = name;
        async {}
    }

    /// Closes every resource owned by the adapter.
    fn close(&self) -> impl Future<Output = LockResult<()>> + Send {
        async { Ok(()) }
    }
}

// ============================================================================
// Expiration Capability
// ============================================================================

/// Backends whose lock records can carry a time-to-live.
///
/// WARNING: a lock that expires while its critical section is still running
/// lets a second holder in. The engine does not guard against this; pick an
/// expiration comfortably longer than the work it protects.
pub trait LockExpiration: LockBackend {
    /// Largest accepted expiration. Larger requests are clamped.
    const MAX_EXPIRATION: Duration;

    /// Sets the expiration applied to records created from now on.
    ///
    /// Zero means the record never expires. Returns the value actually
    /// stored, which is at most [`Self::MAX_EXPIRATION`].
    fn set_expiration(&self, expiration: Duration) -> Duration;

    /// Expiration currently applied to new records.
    fn expiration(&self) -> Duration;
}

/// Clamps `requested` to `max`, truncated to whole seconds.
///
/// A nonzero request shorter than a second becomes one second, since zero
/// means never.
pub fn clamp_expiration(requested: Duration, max: Duration) -> Duration {
    let secs = match requested.as_secs() {
        0 if !requested.is_zero() => 1,
        secs => secs,
    };
    let requested = Duration::from_secs(secs);
    if requested > max {
        warn!(
            requested_secs = requested.as_secs(),
            max_secs = max.as_secs(),
            "lock expiration capped to backend maximum"
        );
        max
    } else {
        requested
    }
}

/// Expiration value shared by adapters implementing [`LockExpiration`].
///
/// Stored atomically so the setting can change while the adapter is shared.
#[derive(Debug)]
pub struct ExpirationSetting {
    secs: AtomicU64,
    max: Duration,
}

impl ExpirationSetting {
    /// Creates a setting that never expires, capped at `max`.
    pub const fn new(max: Duration) -> Self {
        Self {
            secs: AtomicU64::new(0),
            max,
        }
    }

    /// Stores `expiration` after clamping and returns the stored value.
    pub fn set(&self, expiration: Duration) -> Duration {
        let effective = clamp_expiration(expiration, self.max);
        self.secs.store(effective.as_secs(), Ordering::Relaxed);
        effective
    }

    pub fn get(&self) -> Duration {
        Duration::from_secs(self.secs.load(Ordering::Relaxed))
    }

    /// The expiration, or `None` when records never expire.
    pub fn ttl(&self) -> Option<Duration> {
        let ttl = self.get();
        (!ttl.is_zero()).then_some(ttl)
    }
}
