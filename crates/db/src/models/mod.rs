//! Row structs for the local store.
//!
//! Each submodule contains a `FromRow` entity struct matching the table row
//! plus the conversions/DTOs its repository needs.

pub mod cache;
pub mod progress;
pub mod queue;

pub use cache::CacheEntry;
pub use progress::ProgressRow;
pub use queue::{NewPendingOperation, OperationKind, PendingOperation};
