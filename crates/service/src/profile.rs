//! Profile management with field-level encryption.
//!
//! Personal fields (name, display name, classification, level) are
//! encrypted by [`FieldCodec`] before they leave the process; the remote
//! and the local cache only ever hold ciphertext. Decryption failures
//! degrade to neutral placeholders instead of failing the read.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use stride_core::crypto::FieldCodec;
use stride_core::stats::compute_stats;
use stride_core::{CoreError, OwnerStats, ProgressRecord};
use stride_db::models::{NewPendingOperation, OperationKind};
use stride_db::repositories::{CacheRepo, ProgressRepo, QueueRepo};
use stride_remote::{filters, DocumentStore, RemoteError, SetMode};

use crate::auth::Authenticator;
use crate::PROFILES_COLLECTION;

const PLACEHOLDER_NAME: &str = "Profile";
const PLACEHOLDER_CLASSIFICATION: &str = "N/A";
const PLACEHOLDER_LEVEL: &str = "Beginner";

/// A decrypted profile as served to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub profile_id: String,
    pub owner_id: String,
    pub name: String,
    pub display_name: String,
    pub classification: String,
    pub level: String,
    pub stats: OwnerStats,
}

/// Input for creating a profile.
#[derive(Debug, Clone)]
pub struct NewProfile {
    pub name: String,
    pub display_name: String,
    pub classification: String,
    pub level: String,
}

/// Façade for profile CRUD.
pub struct ProfileService {
    pool: SqlitePool,
    remote: Arc<dyn DocumentStore>,
    auth: Arc<dyn Authenticator>,
    codec: FieldCodec,
    total_trackable_units: u32,
}

impl ProfileService {
    pub fn new(
        pool: SqlitePool,
        remote: Arc<dyn DocumentStore>,
        auth: Arc<dyn Authenticator>,
        codec: FieldCodec,
        total_trackable_units: u32,
    ) -> Self {
        Self {
            pool,
            remote,
            auth,
            codec,
            total_trackable_units,
        }
    }

    /// Create a profile under the signed-in account.
    ///
    /// The document is cached locally before the remote write; if the
    /// remote is unreachable the insert is queued and the call still
    /// succeeds.
    pub async fn save_profile(&self, new: NewProfile) -> Result<Profile, CoreError> {
        let owner_id = self.require_account()?;
        if new.name.trim().is_empty() {
            return Err(CoreError::InvalidInput("profile name must be non-empty".into()));
        }

        let profile_id = uuid::Uuid::new_v4().to_string();
        let document = json!({
            "owner_id": owner_id,
            "name": self.codec.encrypt(&new.name),
            "display_name": self.codec.encrypt(&new.display_name),
            "classification": self.codec.encrypt(&new.classification),
            "level": self.codec.encrypt(&new.level),
            "completed_count": 0,
            "progress_percent": 0,
            "stars": 0,
            "created_at": Utc::now().timestamp_millis(),
        });

        // Cache the document and queue its insert in one transaction before
        // any remote outcome is known; a crash from here on can only delay
        // the push, never strand a cached profile with no queued intent.
        let op = NewPendingOperation::new(PROFILES_COLLECTION, &profile_id, OperationKind::Insert)
            .with_payload(document.clone());
        let op_id =
            CacheRepo::put_with_operation(&self.pool, PROFILES_COLLECTION, &profile_id, &document, &op)
                .await
                .map_err(store_err)?;

        match self
            .remote
            .set(PROFILES_COLLECTION, &profile_id, document, SetMode::Replace)
            .await
        {
            Ok(()) => {
                QueueRepo::mark_synced(&self.pool, op_id)
                    .await
                    .map_err(store_err)?;
            }
            Err(RemoteError::Permission(msg)) => {
                // A stale session must not leave a queued insert behind for
                // a profile the caller was told failed.
                QueueRepo::mark_synced(&self.pool, op_id)
                    .await
                    .map_err(store_err)?;
                CacheRepo::remove(&self.pool, PROFILES_COLLECTION, &profile_id)
                    .await
                    .map_err(store_err)?;
                return Err(CoreError::NotAuthenticated(msg));
            }
            Err(e) => {
                tracing::warn!(%profile_id, error = %e, "profile insert deferred to queue");
            }
        }

        Ok(Profile {
            profile_id,
            owner_id,
            name: new.name,
            display_name: new.display_name,
            classification: new.classification,
            level: new.level,
            stats: OwnerStats {
                completed_count: 0,
                progress_percent: 0,
                stars: 0,
            },
        })
    }

    /// All profiles for the signed-in account.
    ///
    /// Remote-first with a cache fallback: a successful query refreshes the
    /// local cache, an unreachable remote serves the cached copies. Stats
    /// are recomputed from local progress records where any exist.
    pub async fn list_profiles(&self) -> Result<Vec<Profile>, CoreError> {
        let owner_id = self.require_account()?;

        let documents = match self
            .remote
            .query(PROFILES_COLLECTION, &filters(&[("owner_id", owner_id.as_str())]))
            .await
        {
            Ok(rows) => {
                for (id, fields) in &rows {
                    CacheRepo::put(&self.pool, PROFILES_COLLECTION, id, fields)
                        .await
                        .map_err(store_err)?;
                }
                rows
            }
            Err(RemoteError::Permission(msg)) => return Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(error = %e, "profile query failed, serving cached profiles");
                CacheRepo::list(&self.pool, PROFILES_COLLECTION)
                    .await
                    .map_err(store_err)?
                    .into_iter()
                    .filter_map(|entry| entry.payload_json().map(|p| (entry.entry_id, p)))
                    .filter(|(_, fields)| {
                        fields.get("owner_id").and_then(Value::as_str) == Some(owner_id.as_str())
                    })
                    .collect()
            }
        };

        let mut profiles = Vec::with_capacity(documents.len());
        for (profile_id, fields) in documents {
            let stats = self.stats_for(&profile_id, &fields).await?;
            if stats != stored_stats(&fields) {
                self.push_stats(&profile_id, stats).await;
            }
            profiles.push(self.decode_profile(profile_id, &owner_id, &fields, stats));
        }
        Ok(profiles)
    }

    /// A single profile by id, remote-first with a cache fallback.
    ///
    /// Absent from both the remote and the cache is a [`CoreError::NotFound`].
    pub async fn get_profile(&self, profile_id: &str) -> Result<Profile, CoreError> {
        let account_id = self.require_account()?;

        let fields = match self.remote.get(PROFILES_COLLECTION, profile_id).await {
            Ok(Some(fields)) => {
                CacheRepo::put(&self.pool, PROFILES_COLLECTION, profile_id, &fields)
                    .await
                    .map_err(store_err)?;
                Some(fields)
            }
            Ok(None) | Err(RemoteError::NotFound { .. }) => None,
            Err(RemoteError::Permission(msg)) => return Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(profile_id, error = %e, "profile fetch failed, trying cache");
                None
            }
        };
        let fields = match fields {
            Some(fields) => fields,
            None => CacheRepo::get(&self.pool, PROFILES_COLLECTION, profile_id)
                .await
                .map_err(store_err)?
                .and_then(|entry| entry.payload_json())
                .ok_or_else(|| CoreError::NotFound {
                    entity: "profile",
                    id: profile_id.to_string(),
                })?,
        };

        let owner_id = fields
            .get("owner_id")
            .and_then(Value::as_str)
            .unwrap_or(account_id.as_str())
            .to_string();
        let stats = self.stats_for(profile_id, &fields).await?;
        Ok(self.decode_profile(profile_id.to_string(), &owner_id, &fields, stats))
    }

    /// Delete a profile. A missing remote document counts as success; an
    /// unreachable remote defers the delete through the queue.
    pub async fn delete_profile(&self, profile_id: &str) -> Result<(), CoreError> {
        self.require_account()?;

        CacheRepo::remove(&self.pool, PROFILES_COLLECTION, profile_id)
            .await
            .map_err(store_err)?;

        match self.remote.delete(PROFILES_COLLECTION, profile_id).await {
            Ok(()) | Err(RemoteError::NotFound { .. }) => Ok(()),
            Err(RemoteError::Permission(msg)) => Err(CoreError::NotAuthenticated(msg)),
            Err(e) => {
                tracing::warn!(profile_id, error = %e, "profile delete deferred to queue");
                QueueRepo::enqueue(
                    &self.pool,
                    &NewPendingOperation::new(PROFILES_COLLECTION, profile_id, OperationKind::Delete),
                )
                .await
                .map_err(store_err)?;
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn require_account(&self) -> Result<String, CoreError> {
        self.auth
            .current_account()
            .ok_or_else(|| CoreError::NotAuthenticated("no account signed in".into()))
    }

    /// Write freshly computed stats onto the profile document. Derived
    /// stats are eventually consistent, so failures are logged only.
    async fn push_stats(&self, profile_id: &str, stats: OwnerStats) {
        let fields = json!({
            "completed_count": stats.completed_count,
            "progress_percent": stats.progress_percent,
            "stars": stats.stars,
        });
        if let Err(e) = self
            .remote
            .update(PROFILES_COLLECTION, profile_id, fields)
            .await
        {
            tracing::warn!(profile_id, error = %e, "stats push on profile load failed");
        }
    }

    /// Stats from local progress records, falling back to the counters
    /// stored on the document when this device has no records yet.
    async fn stats_for(&self, profile_id: &str, fields: &Value) -> Result<OwnerStats, CoreError> {
        let rows = ProgressRepo::list_for_entity(&self.pool, profile_id)
            .await
            .map_err(store_err)?;
        if rows.is_empty() {
            return Ok(stored_stats(fields));
        }
        let records: Vec<ProgressRecord> = rows.into_iter().map(|r| r.into_record()).collect();
        Ok(compute_stats(&records, self.total_trackable_units))
    }

    fn decode_profile(
        &self,
        profile_id: String,
        owner_id: &str,
        fields: &Value,
        stats: OwnerStats,
    ) -> Profile {
        Profile {
            profile_id,
            owner_id: owner_id.to_string(),
            name: self.decode_field(fields, "name", PLACEHOLDER_NAME),
            display_name: self.decode_field(fields, "display_name", PLACEHOLDER_NAME),
            classification: self.decode_field(fields, "classification", PLACEHOLDER_CLASSIFICATION),
            level: self.decode_field(fields, "level", PLACEHOLDER_LEVEL),
            stats,
        }
    }

    /// Decrypt one document field; absent, empty, or undecryptable values
    /// become the placeholder.
    fn decode_field(&self, fields: &Value, key: &str, placeholder: &str) -> String {
        let raw = fields.get(key).and_then(Value::as_str).unwrap_or("");
        if raw.is_empty() {
            return placeholder.to_string();
        }
        let plain = self.codec.decrypt(raw);
        if plain.is_empty() {
            placeholder.to_string()
        } else {
            plain
        }
    }
}

fn stored_stats(fields: &Value) -> OwnerStats {
    OwnerStats {
        completed_count: fields
            .get("completed_count")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32,
        progress_percent: fields
            .get("progress_percent")
            .and_then(Value::as_u64)
            .unwrap_or(0) as u8,
        stars: fields.get("stars").and_then(Value::as_u64).unwrap_or(0) as u8,
    }
}

fn store_err(e: sqlx::Error) -> CoreError {
    CoreError::Store(e.to_string())
}
