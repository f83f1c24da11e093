//! MySQL advisory-lock backend using GET_LOCK/RELEASE_LOCK.

use std::collections::HashMap;

use named_lock_core::backend::LockBackend;
use named_lock_core::error::{LockError, LockResult};
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::connection::{Session, close_session, open_session};
use crate::name::encode_lock_name;
use crate::options::MySqlLockOptions;

/// Where a query borrowed its session from.
enum SessionSource {
    /// The session holding this lock name.
    Lock(String),
    /// The cached query session.
    Query,
}

/// A lock backend built on MySQL's named advisory locks.
///
/// Each lock name gets its own session, opened on first use and closed when
/// the lock is released or the backend is closed. Dropping the backend drops
/// its sessions, and the server frees their locks when they disconnect.
///
/// # Query side effect
///
/// [`query`](LockBackend::query) reuses any open session. When none is open
/// it opens a dedicated query session and keeps it for later queries, until
/// [`close`](LockBackend::close).
pub struct MySqlLockBackend {
    options: MySqlLockOptions,
    /// Lock name to the session that holds (or is trying to take) it.
    sessions: Mutex<HashMap<String, Session>>,
    /// Cached session used by queries when no lock session is open.
    query_session: Mutex<Option<Session>>,
}

impl MySqlLockBackend {
    /// Creates a backend. No connection is opened until a lock is used.
    pub fn new(options: MySqlLockOptions) -> Self {
        Self {
            options,
            sessions: Mutex::new(HashMap::new()),
            query_session: Mutex::new(None),
        }
    }

    pub fn options(&self) -> &MySqlLockOptions {
        &self.options
    }

    /// Number of open per-name sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Returns true if a query session is cached.
    pub async fn has_query_session(&self) -> bool {
        self.query_session.lock().await.is_some()
    }

    /// Returns the session for `name`, opening it if needed.
    async fn session(&self, name: &str) -> LockResult<Session> {
        if let Some(session) = self.sessions.lock().await.get(name) {
            return Ok(session.clone());
        }

        let opened = open_session(&self.options).await?;
        let mut sessions = self.sessions.lock().await;
        Ok(sessions.entry(name.to_string()).or_insert(opened).clone())
    }

    /// Returns any open session, or the cached query session, along with
    /// where it came from.
    async fn any_session(&self) -> LockResult<(Session, SessionSource)> {
        if let Some((name, session)) = self.sessions.lock().await.iter().next() {
            return Ok((session.clone(), SessionSource::Lock(name.clone())));
        }

        let mut cached = self.query_session.lock().await;
        if let Some(session) = cached.as_ref() {
            return Ok((session.clone(), SessionSource::Query));
        }
        let session = open_session(&self.options).await?;
        *cached = Some(session.clone());
        Ok((session, SessionSource::Query))
    }

    /// Closes a session that failed, wherever it is kept.
    async fn discard(&self, source: SessionSource) {
        match source {
            SessionSource::Lock(name) => self.retire(&name).await,
            SessionSource::Query => {
                let cached = self.query_session.lock().await.take();
                if let Some(session) = cached {
                    close_session(session).await;
                }
            }
        }
    }

    /// Removes and closes the session for `name`.
    async fn retire(&self, name: &str) {
        let session = self.sessions.lock().await.remove(name);
        if let Some(session) = session {
            close_session(session).await;
        }
    }

    async fn scalar(
        session: &Session,
        sql: &'static str,
        lock_name: &str,
    ) -> LockResult<Option<i64>> {
        let mut connection = session.lock().await;
        sqlx::query_scalar::<_, Option<i64>>(sql)
            .bind(lock_name)
            .fetch_one(&mut *connection)
            .await
            .map_err(LockError::connection)
    }
}

impl LockBackend for MySqlLockBackend {
    const NAME: &'static str = "mysql";

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn attempt_grant(&self, name: &str) -> LockResult<bool> {
        let session = self.session(name).await?;
        let result = Self::scalar(&session, "SELECT GET_LOCK(?, 0)", &encode_lock_name(name)).await;
        drop(session);

        match result {
            Ok(Some(1)) => Ok(true),
            Ok(Some(0)) => Ok(false),
            Ok(other) => Err(LockError::backend(format!(
                "unexpected GET_LOCK result: {other:?}"
            ))),
            Err(e) => {
                self.retire(name).await;
                Err(e)
            }
        }
    }

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn release(&self, name: &str) -> LockResult<bool> {
        let session = self.session(name).await?;
        let result = Self::scalar(&session, "SELECT RELEASE_LOCK(?)", &encode_lock_name(name)).await;
        drop(session);
        self.retire(name).await;

        match result? {
            Some(1) => Ok(true),
            None => {
                debug!("no such lock, nothing to release");
                Ok(true)
            }
            Some(0) => Ok(false),
            Some(other) => Err(LockError::backend(format!(
                "unexpected RELEASE_LOCK result: {other}"
            ))),
        }
    }

    #[instrument(skip_all, fields(lock.name = %name))]
    async fn query(&self, name: &str) -> LockResult<bool> {
        let (session, source) = self.any_session().await?;
        let result = Self::scalar(&session, "SELECT IS_FREE_LOCK(?)", &encode_lock_name(name)).await;
        drop(session);

        match result {
            Ok(Some(1)) => Ok(false),
            Ok(Some(0)) => Ok(true),
            Ok(other) => Err(LockError::backend(format!(
                "unexpected IS_FREE_LOCK result: {other:?}"
            ))),
            Err(e) => {
                self.discard(source).await;
                Err(e)
            }
        }
    }

    async fn abandon(&self, name: &str) {
        self.retire(name).await;
    }

    async fn close(&self) -> LockResult<()> {
        let sessions: Vec<Session> = self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            close_session(session).await;
        }
        let cached = self.query_session.lock().await.take();
        if let Some(session) = cached {
            close_session(session).await;
        }
        Ok(())
    }
}
