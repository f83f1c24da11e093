//! Workspace package hosting the cross-backend integration tests, benchmarks
//! and demos of [`named_lock`]. Library users depend on `named-lock` itself.

pub use named_lock::*;
