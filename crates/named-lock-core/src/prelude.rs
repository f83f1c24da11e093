//! Convenience prelude for named lock types.

pub use crate::backend::{LockBackend, LockExpiration};
pub use crate::engine::{LockEngine, LockEngineBuilder};
pub use crate::error::{LockError, LockResult};
pub use crate::registry::ReentrancyMode;
pub use crate::timeout::AcquireTimeout;
