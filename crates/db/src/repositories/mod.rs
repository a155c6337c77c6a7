//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&SqlitePool` as the first argument.

pub mod cache_repo;
pub mod progress_repo;
pub mod queue_repo;

pub use cache_repo::CacheRepo;
pub use progress_repo::ProgressRepo;
pub use queue_repo::QueueRepo;
