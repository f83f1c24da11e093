//! MongoDB backend for named locks.
//!
//! A lock is a document keyed by `"lock:" + name`; it is held while the
//! document exists and has not expired.

pub mod backend;
pub mod document;
pub mod options;

pub use backend::{MongoLockBackend, MongoLockBackendBuilder};
pub use document::{LockDocument, LockMetadata};
pub use options::{MongoLockOptions, WriteMode};
