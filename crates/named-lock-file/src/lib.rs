//! File system backend for named locks.
//!
//! Uses OS-level file locks (`flock` on Unix, `LockFileEx` on Windows) on one
//! file per lock name. Works across processes on the same machine, or across
//! machines sharing a file system with working lock support.

pub mod backend;
pub mod name;

pub use backend::{FileLockBackend, FileLockBackendBuilder};
