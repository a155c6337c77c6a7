//! Service façade over the local store, the remote document store, and the
//! sync manager.
//!
//! This is the layer an application embeds: report progress, manage
//! profiles, read stats. Every write lands durably in the local store
//! before any remote outcome is known, and reads prefer the remote copy
//! but degrade to the local cache when it is unreachable.

pub mod auth;
pub mod config;
pub mod profile;
pub mod progress;

pub use auth::{Authenticator, StaticAuth};
pub use config::Config;
pub use profile::{NewProfile, Profile, ProfileService};
pub use progress::{ProgressService, ReportOutcome};

/// Remote collection holding profile documents.
pub const PROFILES_COLLECTION: &str = "profiles";

/// Install the global tracing subscriber, honoring `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
