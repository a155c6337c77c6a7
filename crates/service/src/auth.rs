//! Account identity for service calls.

/// Source of the signed-in account id.
///
/// The services only need to know who owns the data being written; how the
/// session was established is the embedding application's business.
pub trait Authenticator: Send + Sync {
    /// The signed-in account id, or `None` when signed out.
    fn current_account(&self) -> Option<String>;
}

/// Fixed-identity authenticator, for tests and single-user embeddings.
pub struct StaticAuth {
    account: Option<String>,
}

impl StaticAuth {
    pub fn signed_in(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
        }
    }

    pub fn signed_out() -> Self {
        Self { account: None }
    }
}

impl Authenticator for StaticAuth {
    fn current_account(&self) -> Option<String> {
        self.account.clone()
    }
}
