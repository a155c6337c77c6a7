//! Error taxonomy shared across the data layer.
//!
//! `NotAuthenticated` and `InvalidInput` indicate programming or session
//! errors and surface to the caller immediately. `RemoteUnavailable` is
//! always retryable: write paths recover it by caching locally, the sync
//! drain recovers it by halting and leaving the queue intact.

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Local store error: {0}")]
    Store(String),

    #[error("Field decryption degraded: {0}")]
    CryptoDegraded(String),
}

impl CoreError {
    /// Whether retrying later could succeed without any code or session
    /// change. Only remote outages qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::RemoteUnavailable(_))
    }
}
