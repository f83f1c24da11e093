//! The generic locking protocol shared by every backend.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{Span, debug, field, instrument, warn};

use crate::backend::{LockBackend, LockExpiration};
use crate::error::{LockError, LockResult};
use crate::registry::{LockRegistry, ReentrancyMode, ReleaseStep};
use crate::timeout::AcquireTimeout;

/// Sleep between two grant attempts while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Builder for [`LockEngine`] configuration.
pub struct LockEngineBuilder<B> {
    backend: B,
    poll_interval: Duration,
    reentrancy: ReentrancyMode,
}

impl<B: LockBackend> LockEngineBuilder<B> {
    /// Creates a builder with default settings.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            poll_interval: DEFAULT_POLL_INTERVAL,
            reentrancy: ReentrancyMode::default(),
        }
    }

    /// Sets the sleep between grant attempts while waiting.
    ///
    /// Bounded waits may overshoot their timeout by up to one interval plus
    /// one backend round trip.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets how re-entrant acquisitions are counted.
    pub fn reentrancy(mut self, mode: ReentrancyMode) -> Self {
        self.reentrancy = mode;
        self
    }

    /// Builds the engine.
    pub fn build(self) -> LockEngine<B> {
        LockEngine {
            backend: self.backend,
            registry: LockRegistry::new(self.reentrancy),
            poll_interval: self.poll_interval,
        }
    }
}

/// Acquires and releases named locks through a [`LockBackend`].
///
/// The engine owns the waiting logic and a registry of the names it holds;
/// the backend alone decides who actually holds a lock. One engine is one
/// lock holder: two engines over the same store contend with each other,
/// while repeated acquisitions through the same engine are re-entrant.
///
/// Engines can be shared across tasks (for example behind an `Arc`).
///
/// # Example
///
/// ```rust,ignore
/// let engine = LockEngine::new(backend);
///
/// if engine.acquire_lock("nightly-report", Duration::from_secs(5)).await? {
///     build_report().await;
///     engine.release_lock("nightly-report").await?;
/// }
/// ```
pub struct LockEngine<B> {
    backend: B,
    registry: LockRegistry,
    poll_interval: Duration,
}

impl<B: LockBackend> LockEngine<B> {
    /// Creates an engine with default settings.
    pub fn new(backend: B) -> Self {
        Self::builder(backend).build()
    }

    /// Returns a new builder for configuring the engine.
    pub fn builder(backend: B) -> LockEngineBuilder<B> {
        LockEngineBuilder::new(backend)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn reentrancy(&self) -> ReentrancyMode {
        self.registry.mode()
    }

    /// Acquires `name`, trying for as long as `timeout` allows.
    ///
    /// A name this engine already holds is granted again immediately,
    /// without contacting the backend.
    ///
    /// # Arguments
    ///
    /// * `timeout` - An [`AcquireTimeout`], a `Duration` or an
    ///   `Option<Duration>` (`None` waits indefinitely, zero tries once).
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Lock acquired
    /// * `Ok(false)` - Lock still held by someone else when the timeout ran out
    /// * `Err(...)` - The backend failed; waiting stops at the first failure
    pub async fn acquire_lock(
        &self,
        name: &str,
        timeout: impl Into<AcquireTimeout>,
    ) -> LockResult<bool> {
        self.acquire_with(name, timeout.into()).await
    }

    /// Makes a single attempt to acquire `name`.
    pub async fn try_acquire_lock(&self, name: &str) -> LockResult<bool> {
        self.acquire_with(name, AcquireTimeout::Immediate).await
    }

    #[instrument(skip_all, fields(lock.name = %name, backend = B::NAME, timeout = ?timeout, acquired = field::Empty, elapsed_ms = field::Empty))]
    async fn acquire_with(&self, name: &str, timeout: AcquireTimeout) -> LockResult<bool> {
        if self.registry.reenter(name) {
            Span::current().record("acquired", true);
            debug!(depth = self.registry.depth(name), "re-entered held lock");
            return Ok(true);
        }

        let start = Instant::now();
        loop {
            let granted = match self.backend.attempt_grant(name).await {
                Ok(granted) => granted,
                Err(e) => {
                    warn!(error = %e, "grant attempt failed");
                    self.backend.abandon(name).await;
                    return Err(e);
                }
            };

            let elapsed = start.elapsed();
            if granted {
                self.registry.record(name);
                Span::current().record("acquired", true);
                Span::current().record("elapsed_ms", elapsed.as_millis() as u64);
                return Ok(true);
            }

            if timeout.is_exhausted(elapsed) {
                self.backend.abandon(name).await;
                Span::current().record("acquired", false);
                Span::current().record("elapsed_ms", elapsed.as_millis() as u64);
                debug!("lock held elsewhere, giving up");
                return Ok(false);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Releases `name`.
    ///
    /// With [`ReentrancyMode::Flag`] a single call gives the lock up however
    /// many times it was acquired. With [`ReentrancyMode::Counted`] only the
    /// outermost release reaches the backend.
    ///
    /// Releasing a name the backend no longer has (never acquired, already
    /// released, expired) succeeds. `Ok(false)` means another holder owns it.
    #[instrument(skip_all, fields(lock.name = %name, backend = B::NAME, released = field::Empty))]
    pub async fn release_lock(&self, name: &str) -> LockResult<bool> {
        if let ReleaseStep::Nested(remaining) = self.registry.release_step(name) {
            Span::current().record("released", true);
            debug!(remaining, "nested release");
            return Ok(true);
        }

        let released = self.backend.release(name).await?;
        if released {
            self.registry.remove(name);
        }
        Span::current().record("released", released);
        Ok(released)
    }

    /// Asks the backend whether anyone holds `name`.
    ///
    /// Never acquires anything and leaves the registry untouched.
    #[instrument(skip_all, fields(lock.name = %name, backend = B::NAME))]
    pub async fn is_locked(&self, name: &str) -> LockResult<bool> {
        self.backend.query(name).await
    }

    /// Forgets that this engine holds `name`, without releasing it.
    ///
    /// Do not use this method unless you know what you do: the backend lock
    /// stays in place. It exists to recover a registry that no longer matches
    /// the backend, for example after a network partition. Returns whether
    /// an entry was forgotten.
    pub fn clear_lock(&self, name: &str) -> bool {
        let cleared = self.registry.remove(name);
        if cleared {
            warn!(lock.name = %name, backend = B::NAME, "lock cleared without release");
        }
        cleared
    }

    /// Returns true if this engine believes it holds `name`.
    pub fn is_held(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Names this engine believes it holds, sorted.
    pub fn held_locks(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Releases every lock this engine holds.
    ///
    /// All names are attempted; the first error is returned. Nested
    /// acquisitions are released along with the outer one.
    #[instrument(skip_all, fields(backend = B::NAME, count = self.registry.len()))]
    pub async fn release_all(&self) -> LockResult<()> {
        let mut first_error: Option<LockError> = None;
        for name in self.registry.names() {
            match self.backend.release(&name).await {
                Ok(true) => {
                    self.registry.remove(&name);
                }
                Ok(false) => {
                    warn!(lock.name = %name, "lock owned by another holder, forgetting it");
                    self.registry.remove(&name);
                }
                Err(e) => {
                    warn!(lock.name = %name, error = %e, "failed to release lock");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Releases every held lock, then closes the backend.
    ///
    /// The backend is closed even when a release fails.
    pub async fn shutdown(self) -> LockResult<()> {
        let released = self.release_all().await;
        let closed = self.backend.close().await;
        released.and(closed)
    }
}

impl<B: LockExpiration> LockEngine<B> {
    /// Sets the expiration of lock records created from now on.
    ///
    /// Zero means never. Returns the stored value, capped at the backend's
    /// maximum. See [`LockExpiration`] for the risk of expiring locks.
    pub fn set_expiration(&self, expiration: Duration) -> Duration {
        self.backend.set_expiration(expiration)
    }

    pub fn expiration(&self) -> Duration {
        self.backend.expiration()
    }
}
