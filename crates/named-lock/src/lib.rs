//! Named distributed locks for Rust with multiple backend support.
//!
//! A lock is identified only by its name. Any process that can reach the same
//! store and uses the same name contends for the same lock. The
//! [`LockEngine`] drives acquisition (polling, timeouts, reentrancy) and
//! delegates the actual mutual exclusion to a [`LockBackend`]: MySQL named
//! locks, MongoDB documents, Redis keys, or OS file locks.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use named_lock::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a backend (example: file backend)
//!     let backend = FileLockBackend::new("/tmp/locks")?;
//!     let engine = LockEngine::new(backend);
//!
//!     // Wait up to five seconds for the lock
//!     if engine.acquire_lock("my-resource", Duration::from_secs(5)).await? {
//!         // Critical section - we have exclusive access
//!         println!("Doing critical work...");
//!
//!         engine.release_lock("my-resource").await?;
//!     }
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! ## File System Backend
//!
//! Uses OS-level file locking. Simple and requires no external services.
//!
//! ```rust,no_run
//! use named_lock::FileLockBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = FileLockBackend::builder().directory("/tmp/locks").build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## MySQL Backend
//!
//! Uses `GET_LOCK`/`RELEASE_LOCK`, with one database session per held lock.
//!
//! ```rust,no_run
//! use named_lock::{MySqlLockBackend, MySqlLockOptions};
//!
//! let options = MySqlLockOptions::builder()
//!     .host("localhost")
//!     .user("app")
//!     .password("secret")
//!     .build();
//! let backend = MySqlLockBackend::new(options);
//! ```
//!
//! ## MongoDB Backend
//!
//! Stores one document per held lock, optionally expiring.
//!
//! ```rust,no_run
//! use named_lock::MongoLockBackend;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = mongodb::Client::with_uri_str("mongodb://localhost:27017").await?;
//! let backend = MongoLockBackend::from_database(&client.database("app"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Redis Backend
//!
//! Uses `SET NX` with an optional expiration and a compare-and-delete release.
//!
//! ```rust,no_run
//! use named_lock::RedisLockBackend;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = RedisLockBackend::connect("redis://localhost:6379").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Organization
//!
//! This is a meta-crate that re-exports types from:
//! - `named-lock-core`: engine, backend contract and errors
//! - `named-lock-file`: file system backend
//! - `named-lock-mysql`: MySQL backend
//! - `named-lock-mongo`: MongoDB backend
//! - `named-lock-redis`: Redis backend
//!
//! For fine-grained control, you can depend on individual crates instead.

// Re-export core types and traits
pub use named_lock_core::prelude::*;
pub use named_lock_core::{backend, engine, error, registry, timeout};

// Backends
pub use named_lock_file::{FileLockBackend, FileLockBackendBuilder};
pub use named_lock_mongo::{
    LockDocument, LockMetadata, MongoLockBackend, MongoLockBackendBuilder, WriteMode,
};
pub use named_lock_mysql::{
    ConfigWarning, MySqlLockBackend, MySqlLockOptions, MySqlLockOptionsBuilder,
};
pub use named_lock_redis::{RedisLockBackend, RedisLockBackendBuilder};

/// Backend crates, for items not re-exported at the top level.
pub mod backends {
    pub use named_lock_file as file;
    pub use named_lock_mongo as mongo;
    pub use named_lock_mysql as mysql;
    pub use named_lock_redis as redis;
}
