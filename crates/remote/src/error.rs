//! Typed failures from the remote document store.

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Transport failure, timeout, or service outage. Always retryable.
    #[error("Network error: {0}")]
    Network(String),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Remote error: {0}")]
    Unknown(String),
}

impl RemoteError {
    /// Whether a later retry of the same call could succeed.
    ///
    /// Permission failures need a fresh session and NotFound needs a
    /// different id; neither is a reason to keep an item queued.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RemoteError::Network(_) | RemoteError::Unknown(_))
    }
}
