//! Redis backend for named locks.
//!
//! A lock is a key set with `SET NX`, optionally expiring, released by a
//! compare-and-delete script.

pub mod backend;
pub mod script;

pub use backend::{RedisLockBackend, RedisLockBackendBuilder};
