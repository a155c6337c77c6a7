//! Shared domain logic for the stride data layer.
//!
//! This crate has no internal dependencies so it can be used by the local
//! store, the sync manager, and the service façade alike. It holds the
//! progress record model and completion predicate, the derived-stat
//! aggregator, the field-level encryption codec, and the error taxonomy.

pub mod crypto;
pub mod error;
pub mod progress;
pub mod stats;
pub mod types;

pub use error::CoreError;
pub use progress::{PlayEvent, ProgressRecord, ProgressStatus};
pub use stats::OwnerStats;
