//! In-process store backend.
//!
//! Backs tests and `--store memory` runs.  Expiry is lazy: an expired value is
//! dropped the next time its key is touched.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{KvStore, StoreError};

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, StoredValue>,
    sets: HashMap<String, BTreeSet<String>>,
}

/// Mutex-guarded hash maps.  All operations are short and synchronous, so the
/// lock is never held across an await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-mutation in another test thread;
        // the data is still structurally valid for our purposes.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn live(value: &StoredValue, now: DateTime<Utc>) -> bool {
    value.expires_at.map(|t| t > now).unwrap_or(true)
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Utc::now();
        let mut inner = self.lock();
        match inner.values.get(key) {
            Some(v) if live(v, now) => Ok(Some(v.bytes.clone())),
            Some(_) => {
                inner.values.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.lock().values.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl).map_err(|e| StoreError::Backend(e.to_string()))?;
        self.lock().values.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.lock().values.remove(key);
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        if let Some(set) = self.lock().sets.get_mut(key) {
            set.remove(member);
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .lock()
            .sets
            .get(key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        next: u64,
    ) -> Result<bool, StoreError> {
        let now = Utc::now();
        let mut inner = self.lock();
        let current = inner
            .values
            .get(key)
            .filter(|v| live(v, now))
            .map(|v| {
                let arr: [u8; 8] = v
                    .bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Backend(format!("{key} is not a counter")))?;
                Ok::<u64, StoreError>(u64::from_le_bytes(arr))
            })
            .transpose()?;

        if current != expected {
            return Ok(false);
        }
        inner.values.insert(
            key.to_string(),
            StoredValue {
                bytes: next.to_le_bytes().to_vec(),
                expires_at: None,
            },
        );
        Ok(true)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
