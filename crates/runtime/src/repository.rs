//! Key scheme and load/save plumbing over the [`KvStore`] trait.
//!
//! Records are JSON blobs under flat string keys:
//!
//! - `resolution:<uuid>` — one resolution, indexed by the `resolutions:all` set
//! - `resolutions:version` — `u64` counter guarding collection saves
//! - `preferences` — the single user's notification preferences
//! - `conversation:<id>` — session transcript, expires after 24 hours
//! - `nudge:<uuid>` — delivered-nudge audit record, indexed by `nudges:all`
//!
//! Loads build owned in-memory state; saves write the whole collection back
//! behind a compare-and-swap on the version counter.  Two interleaved savers
//! always conflict: the CAS runs before any record write, so the loser is
//! rejected with its records untouched.  The counter guards writers only — a
//! load racing the record writes of an in-flight save can still observe the
//! bumped version alongside not-yet-rewritten records, and a save based on
//! that load lands.  Closing that window would take multi-key transactions
//! the [`KvStore`] contract does not offer; turns within one process run
//! sequentially, so it is only reachable across processes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use stride_core::{
    conversation_ttl, Conversation, NudgeRecord, NudgeStatus, ResolutionSet, UpdateSentiment,
    UserPreferences,
};
use stride_store::{KvStore, StoreError};

const RESOLUTIONS_INDEX: &str = "resolutions:all";
const RESOLUTIONS_VERSION: &str = "resolutions:version";
const PREFERENCES_KEY: &str = "preferences";
const NUDGES_INDEX: &str = "nudges:all";

fn resolution_key(id: Uuid) -> String {
    format!("resolution:{id}")
}

fn conversation_key(id: &str) -> String {
    format!("conversation:{id}")
}

fn nudge_key(id: Uuid) -> String {
    format!("nudge:{id}")
}

/// A resolution collection together with the version it was loaded at.  Saving
/// requires the loaded version so the store can reject stale writers.
#[derive(Debug)]
pub struct LoadedResolutions {
    pub set: ResolutionSet,
    version: Option<u64>,
}

impl LoadedResolutions {
    /// An empty collection that has never been saved.  Used when a fresh
    /// store has no version key yet.
    pub fn empty() -> Self {
        Self {
            set: ResolutionSet::new(),
            version: None,
        }
    }
}

#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn KvStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Load every indexed resolution.  An index entry whose record is missing
    /// or unparseable is skipped with a warning rather than failing the load.
    pub async fn load_resolutions(&self) -> Result<LoadedResolutions, StoreError> {
        let version = self.read_version().await?;
        let mut set = ResolutionSet::new();
        for id in self.store.set_members(RESOLUTIONS_INDEX).await? {
            let Some(bytes) = self.store.get(&resolution_key_str(&id)).await? else {
                warn!(id, "resolution indexed but record missing");
                continue;
            };
            match serde_json::from_slice(&bytes) {
                Ok(resolution) => {
                    set.insert(resolution);
                }
                Err(err) => warn!(id, %err, "skipping unparseable resolution record"),
            }
        }
        Ok(LoadedResolutions { set, version })
    }

    /// Write the whole collection back.  Fails with
    /// [`StoreError::VersionConflict`] when another writer saved since
    /// `loaded` was read; callers should reload and retry.
    pub async fn save_resolutions(&self, loaded: &LoadedResolutions) -> Result<u64, StoreError> {
        let next = loaded.version.unwrap_or(0) + 1;
        let swapped = self
            .store
            .compare_and_swap(RESOLUTIONS_VERSION, loaded.version, next)
            .await?;
        if !swapped {
            return Err(StoreError::VersionConflict(RESOLUTIONS_INDEX.to_string()));
        }

        let previous = self.store.set_members(RESOLUTIONS_INDEX).await?;
        for resolution in loaded.set.iter() {
            let bytes = serde_json::to_vec(resolution)
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            self.store.set(&resolution_key(resolution.id), &bytes).await?;
            self.store
                .add_to_set(RESOLUTIONS_INDEX, &resolution.id.to_string())
                .await?;
        }
        // Records dropped from the collection (deleted resolutions) come off
        // disk and out of the index.
        for id in previous {
            let still_present = id
                .parse::<Uuid>()
                .map(|uuid| loaded.set.contains(&uuid))
                .unwrap_or(false);
            if !still_present {
                self.store.delete(&resolution_key_str(&id)).await?;
                self.store.remove_from_set(RESOLUTIONS_INDEX, &id).await?;
            }
        }
        Ok(next)
    }

    /// Preferences, defaulted and persisted on first read so later partial
    /// writes always merge against a complete record.
    pub async fn load_preferences(&self) -> Result<UserPreferences, StoreError> {
        match self.store.get(PREFERENCES_KEY).await? {
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(prefs) => Ok(prefs),
                Err(err) => {
                    warn!(%err, "unparseable preferences record, resetting to defaults");
                    let prefs = UserPreferences::default();
                    self.save_preferences(&prefs).await?;
                    Ok(prefs)
                }
            },
            None => {
                let prefs = UserPreferences::default();
                self.save_preferences(&prefs).await?;
                Ok(prefs)
            }
        }
    }

    pub async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(prefs).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store.set(PREFERENCES_KEY, &bytes).await
    }

    /// A missing or expired conversation is simply a fresh one.
    pub async fn load_conversation(&self, id: &str) -> Result<Conversation, StoreError> {
        match self.store.get(&conversation_key(id)).await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(id, %err, "unparseable conversation record, starting fresh");
                Conversation::default()
            })),
            None => Ok(Conversation::default()),
        }
    }

    /// Save refreshes the 24-hour TTL, so the transcript expires relative to
    /// the last turn rather than the first.
    pub async fn save_conversation(
        &self,
        id: &str,
        conversation: &Conversation,
    ) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(conversation).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store
            .set_with_ttl(&conversation_key(id), &bytes, conversation_ttl())
            .await
    }

    pub async fn record_nudge(&self, record: &NudgeRecord) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec(record).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store.set(&nudge_key(record.id), &bytes).await?;
        self.store
            .add_to_set(NUDGES_INDEX, &record.id.to_string())
            .await
    }

    /// Attach a user response to the most recent still-unanswered nudge for
    /// `resolution_id`.  A no-op when no delivered record exists — the
    /// response data still lives on the resolution's update log.
    pub async fn mark_nudge_responded(
        &self,
        resolution_id: Uuid,
        content: &str,
        sentiment: Option<UpdateSentiment>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut candidates: Vec<NudgeRecord> = self
            .nudge_history()
            .await?
            .into_iter()
            .filter(|r| r.resolution_id == resolution_id && r.status == NudgeStatus::Delivered)
            .collect();
        candidates.sort_by_key(|r| r.delivered_at);
        let Some(mut record) = candidates.pop() else {
            return Ok(());
        };

        record.mark_responded(content, sentiment, now);
        let bytes =
            serde_json::to_vec(&record).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.store.set(&nudge_key(record.id), &bytes).await
    }

    pub async fn nudge_history(&self) -> Result<Vec<NudgeRecord>, StoreError> {
        let mut records = Vec::new();
        for id in self.store.set_members(NUDGES_INDEX).await? {
            let Some(bytes) = self.store.get(&format!("nudge:{id}")).await? else {
                continue;
            };
            match serde_json::from_slice(&bytes) {
                Ok(record) => records.push(record),
                Err(err) => warn!(id, %err, "skipping unparseable nudge record"),
            }
        }
        Ok(records)
    }

    async fn read_version(&self) -> Result<Option<u64>, StoreError> {
        let Some(bytes) = self.store.get(RESOLUTIONS_VERSION).await? else {
            return Ok(None);
        };
        let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
            StoreError::Backend(format!(
                "version counter at {RESOLUTIONS_VERSION} is not 8 bytes"
            ))
        })?;
        Ok(Some(u64::from_le_bytes(bytes)))
    }
}

fn resolution_key_str(id: &str) -> String {
    format!("resolution:{id}")
}

// ── Tests ────────────────────────────────────────────────────────────────────
