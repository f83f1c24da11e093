//! MySQL backend for named locks.
//!
//! Uses MySQL's GET_LOCK, RELEASE_LOCK and IS_FREE_LOCK functions. Locks are
//! scoped to the database session that took them, so the backend keeps one
//! session per held lock name.

pub mod backend;
mod connection;
pub mod name;
pub mod options;

pub use backend::MySqlLockBackend;
pub use options::{ConfigWarning, MySqlLockOptions, MySqlLockOptionsBuilder};
