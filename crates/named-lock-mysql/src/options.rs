//! Connection settings for the MySQL backend.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default MySQL port.
pub const DEFAULT_PORT: u16 = 3306;

/// A setting that cannot be honored as written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The CA certificate does not exist. Unless TLS is required, sessions
    /// fall back to an unencrypted connection.
    #[error("SSL CA certificate file doesn't exist: {}", .0.display())]
    MissingCaCertificate(PathBuf),
}

/// Settings used to open every MySQL session.
#[derive(Clone)]
pub struct MySqlLockOptions {
    pub(crate) user: String,
    pub(crate) password: String,
    pub(crate) host: String,
    pub(crate) port: u16,
    pub(crate) ssl_ca: Option<PathBuf>,
    pub(crate) require_tls: bool,
}

impl MySqlLockOptions {
    /// Returns a new builder for configuring the options.
    pub fn builder() -> MySqlLockOptionsBuilder {
        MySqlLockOptionsBuilder::new()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn ssl_ca(&self) -> Option<&Path> {
        self.ssl_ca.as_deref()
    }

    pub fn require_tls(&self) -> bool {
        self.require_tls
    }

    /// Reports settings that would be degraded when a session is opened.
    ///
    /// Opening a session applies the same checks and logs each warning.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        if let Some(ca) = &self.ssl_ca
            && !ca.exists()
        {
            warnings.push(ConfigWarning::MissingCaCertificate(ca.clone()));
        }
        warnings
    }
}

impl std::fmt::Debug for MySqlLockOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlLockOptions")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("ssl_ca", &self.ssl_ca)
            .field("require_tls", &self.require_tls)
            .finish()
    }
}

/// Builder for [`MySqlLockOptions`].
pub struct MySqlLockOptionsBuilder {
    options: MySqlLockOptions,
}

impl MySqlLockOptionsBuilder {
    /// Creates a builder for `root@localhost:3306` without a password.
    pub fn new() -> Self {
        Self {
            options: MySqlLockOptions {
                user: "root".to_string(),
                password: String::new(),
                host: "localhost".to_string(),
                port: DEFAULT_PORT,
                ssl_ca: None,
                require_tls: false,
            },
        }
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.options.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.options.password = password.into();
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.options.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.options.port = port;
        self
    }

    /// Connects over TLS, verifying the server against this CA certificate.
    pub fn ssl_ca(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.ssl_ca = Some(path.into());
        self
    }

    /// Fails session setup instead of falling back to an unencrypted
    /// connection when the CA certificate is missing.
    pub fn require_tls(mut self, require: bool) -> Self {
        self.options.require_tls = require;
        self
    }

    pub fn build(self) -> MySqlLockOptions {
        self.options
    }
}

impl Default for MySqlLockOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
