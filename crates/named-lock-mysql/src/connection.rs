//! MySQL session management.
//!
//! Advisory locks belong to the session that took them, so every lock name
//! gets a session of its own rather than a pooled connection.

use std::path::PathBuf;
use std::sync::Arc;

use named_lock_core::error::{LockError, LockResult};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlSslMode};
use sqlx::{ConnectOptions, Connection};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::options::{ConfigWarning, MySqlLockOptions};

/// A session shared between the operations that use it.
pub(crate) type Session = Arc<Mutex<MySqlConnection>>;

/// Transport security applied when opening a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TlsPolicy {
    /// Verify the server against this CA.
    VerifyCa(PathBuf),
    /// Plain connection; the configured CA could not be used.
    Disabled,
    /// Driver default (TLS when the server offers it).
    Preferred,
}

/// Resolves the TLS settings, degrading a missing CA unless TLS is required.
pub(crate) fn tls_policy(options: &MySqlLockOptions) -> LockResult<TlsPolicy> {
    let Some(ca) = &options.ssl_ca else {
        return Ok(TlsPolicy::Preferred);
    };

    if ca.exists() {
        return Ok(TlsPolicy::VerifyCa(ca.clone()));
    }

    let warning = ConfigWarning::MissingCaCertificate(ca.clone());
    if options.require_tls {
        return Err(LockError::Configuration(warning.to_string()));
    }
    warn!(%warning, "falling back to an unencrypted MySQL connection");
    Ok(TlsPolicy::Disabled)
}

fn connect_options(options: &MySqlLockOptions) -> LockResult<MySqlConnectOptions> {
    let connect = MySqlConnectOptions::new()
        .host(&options.host)
        .port(options.port)
        .username(&options.user)
        .password(&options.password);

    Ok(match tls_policy(options)? {
        TlsPolicy::VerifyCa(ca) => connect.ssl_mode(MySqlSslMode::VerifyCa).ssl_ca(ca),
        TlsPolicy::Disabled => connect.ssl_mode(MySqlSslMode::Disabled),
        TlsPolicy::Preferred => connect,
    })
}

/// Opens a new dedicated session.
pub(crate) async fn open_session(options: &MySqlLockOptions) -> LockResult<Session> {
    let connection = connect_options(options)?
        .connect()
        .await
        .map_err(LockError::connection)?;
    debug!(host = %options.host, port = options.port, "opened MySQL session");
    Ok(Arc::new(Mutex::new(connection)))
}

/// Closes a session once nothing else is using it.
///
/// A session still shared with an in-flight operation is dropped instead and
/// disconnects when that operation finishes.
pub(crate) async fn close_session(session: Session) {
    if let Ok(connection) = Arc::try_unwrap(session)
        && let Err(e) = connection.into_inner().close().await
    {
        debug!(error = %e, "MySQL session did not close cleanly");
    }
}
