//! Environment-driven configuration.

use std::path::PathBuf;

use stride_core::stats::DEFAULT_TOTAL_TRACKABLE_UNITS;

pub const DATABASE_PATH_VAR: &str = "STRIDE_DATABASE_PATH";
pub const REMOTE_URL_VAR: &str = "STRIDE_REMOTE_URL";
pub const REMOTE_TOKEN_VAR: &str = "STRIDE_REMOTE_TOKEN";
pub const TOTAL_UNITS_VAR: &str = "STRIDE_TOTAL_UNITS";

/// Runtime configuration, read once at startup.
///
/// The field-encryption secret is not held here; the codec reads
/// `STRIDE_FIELD_KEY` itself (see `stride_core::crypto`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Local store path. Defaults to `stride.db` in the working directory.
    pub database_path: PathBuf,
    /// Remote document-store base URL. `None` means no remote is
    /// configured and every write stays local until one is.
    pub remote_url: Option<String>,
    /// Bearer token for the remote, if it requires one.
    pub remote_token: Option<String>,
    /// Curriculum size used for percent/star computation.
    pub total_trackable_units: u32,
}

impl Config {
    /// Load configuration from the environment, reading a `.env` file
    /// first when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_path = std::env::var(DATABASE_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("stride.db"));

        let total_trackable_units = match std::env::var(TOTAL_UNITS_VAR) {
            Ok(raw) => match raw.parse() {
                Ok(n) => n,
                Err(_) => {
                    tracing::warn!(
                        value = %raw,
                        "unparseable {TOTAL_UNITS_VAR}, using default of {DEFAULT_TOTAL_TRACKABLE_UNITS}"
                    );
                    DEFAULT_TOTAL_TRACKABLE_UNITS
                }
            },
            Err(_) => DEFAULT_TOTAL_TRACKABLE_UNITS,
        };

        Self {
            database_path,
            remote_url: std::env::var(REMOTE_URL_VAR).ok(),
            remote_token: std::env::var(REMOTE_TOKEN_VAR).ok(),
            total_trackable_units,
        }
    }
}
