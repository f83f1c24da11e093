//! Lock engine and backend contract for named distributed locks.

pub mod backend;
pub mod engine;
pub mod error;
pub mod prelude;
pub mod registry;
pub mod timeout;

pub use error::{LockError, LockResult};
pub use prelude::*;
