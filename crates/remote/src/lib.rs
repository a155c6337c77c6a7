//! Client boundary for the remote document store.
//!
//! The rest of the data layer consumes the remote service exclusively
//! through the [`DocumentStore`] trait: an explicit handle constructed once
//! at startup and passed into the sync manager and service façades, never a
//! process-global singleton. Two implementations ship here — an HTTP
//! client for the real backend and an in-memory store for tests and
//! offline demos.

pub mod error;
pub mod http;
pub mod memory;
pub mod store;

pub use error::RemoteError;
pub use http::HttpDocumentStore;
pub use memory::MemoryDocumentStore;
pub use store::{filters, DocumentStore, SetMode};
