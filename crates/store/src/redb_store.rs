//! Embedded persistent backend on top of [`redb`].
//!
//! Three tables: opaque blobs, per-key expiry stamps, and set membership.
//! Sets are stored as newline-separated member lists under the set key, which
//! keeps the schema to plain `&str` keys.  Expired values are hidden from
//! reads and reaped on the next write to the same key.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};

use crate::{backend, KvStore, StoreError};

const VALUES: TableDefinition<&str, &[u8]> = TableDefinition::new("values");
/// Unix epoch milliseconds after which the value under the same key is dead.
const EXPIRY: TableDefinition<&str, i64> = TableDefinition::new("expiry");
const SETS: TableDefinition<&str, &str> = TableDefinition::new("sets");

pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create the database file at `path`, creating parent
    /// directories and all tables up front.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(backend)?;
        }
        let db = Database::create(path).map_err(backend)?;
        {
            let tx = db.begin_write().map_err(backend)?;
            tx.open_table(VALUES).map_err(backend)?;
            tx.open_table(EXPIRY).map_err(backend)?;
            tx.open_table(SETS).map_err(backend)?;
            tx.commit().map_err(backend)?;
        }
        Ok(Self { db })
    }

    fn read_expiry(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let tx = self.db.begin_read().map_err(backend)?;
        let table = tx.open_table(EXPIRY).map_err(backend)?;
        Ok(table.get(key).map_err(backend)?.map(|v| v.value()))
    }

    fn write_value(
        &self,
        key: &str,
        value: &[u8],
        expires_at_ms: Option<i64>,
    ) -> Result<(), StoreError> {
        let tx = self.db.begin_write().map_err(backend)?;
        {
            let mut values = tx.open_table(VALUES).map_err(backend)?;
            values.insert(key, value).map_err(backend)?;
            let mut expiry = tx.open_table(EXPIRY).map_err(backend)?;
            match expires_at_ms {
                Some(ms) => {
                    expiry.insert(key, ms).map_err(backend)?;
                }
                None => {
                    expiry.remove(key).map_err(backend)?;
                }
            }
        }
        tx.commit().map_err(backend)
    }

    fn read_set(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let tx = self.db.begin_read().map_err(backend)?;
        let table = tx.open_table(SETS).map_err(backend)?;
        let list = table
            .get(key)
            .map_err(backend)?
            .map(|v| v.value().to_string())
            .unwrap_or_default();
        Ok(list.lines().filter(|s| !s.is_empty()).map(String::from).collect())
    }

    fn write_set(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        let joined = members.join("\n");
        let tx = self.db.begin_write().map_err(backend)?;
        {
            let mut table = tx.open_table(SETS).map_err(backend)?;
            if joined.is_empty() {
                table.remove(key).map_err(backend)?;
            } else {
                table.insert(key, joined.as_str()).map_err(backend)?;
            }
        }
        tx.commit().map_err(backend)
    }
}

#[async_trait]
impl KvStore for RedbStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(ms) = self.read_expiry(key)? {
            if ms <= Utc::now().timestamp_millis() {
                return Ok(None);
            }
        }
        let tx = self.db.begin_read().map_err(backend)?;
        let table = tx.open_table(VALUES).map_err(backend)?;
        Ok(table.get(key).map_err(backend)?.map(|v| v.value().to_vec()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write_value(key, value, None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let expires_at = Utc::now().timestamp_millis() + ttl.as_millis() as i64;
        self.write_value(key, value, Some(expires_at))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let tx = self.db.begin_write().map_err(backend)?;
        {
            let mut values = tx.open_table(VALUES).map_err(backend)?;
            values.remove(key).map_err(backend)?;
            let mut expiry = tx.open_table(EXPIRY).map_err(backend)?;
            expiry.remove(key).map_err(backend)?;
        }
        tx.commit().map_err(backend)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut members = self.read_set(key)?;
        if !members.iter().any(|m| m == member) {
            members.push(member.to_string());
            members.sort();
            self.write_set(key, &members)?;
        }
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut members = self.read_set(key)?;
        let before = members.len();
        members.retain(|m| m != member);
        if members.len() != before {
            self.write_set(key, &members)?;
        }
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.read_set(key)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        next: u64,
    ) -> Result<bool, StoreError> {
        // The write transaction serializes writers, making read+compare+write
        // atomic with respect to other CAS callers.
        let tx = self.db.begin_write().map_err(backend)?;
        let swapped;
        {
            let mut values = tx.open_table(VALUES).map_err(backend)?;
            let current = match values.get(key).map_err(backend)? {
                None => None,
                Some(v) => {
                    let bytes: [u8; 8] = v
                        .value()
                        .try_into()
                        .map_err(|_| StoreError::Backend(format!("{key} is not a counter")))?;
                    Some(u64::from_le_bytes(bytes))
                }
            };
            swapped = current == expected;
            if swapped {
                values
                    .insert(key, next.to_le_bytes().as_slice())
                    .map_err(backend)?;
            }
        }
        tx.commit().map_err(backend)?;
        Ok(swapped)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = RedbStore::open(dir.path().join("stride.redb")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn roundtrip_survives_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stride.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.set("resolution:abc", b"{}").await.unwrap();
            store.add_to_set("resolutions:all", "abc").await.unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("resolution:abc").await.unwrap().unwrap(), b"{}");
        assert_eq!(
            store.set_members("resolutions:all").await.unwrap(),
            vec!["abc"]
        );
    }

    #[tokio::test]
    async fn ttl_hides_expired_values() {
        let (_dir, store) = open_temp();
        store
            .set_with_ttl("conversation:s1", b"hi", Duration::from_secs(0))
            .await
            .unwrap();
        assert!(store.get("conversation:s1").await.unwrap().is_none());

        store
            .set_with_ttl("conversation:s2", b"hi", Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(store.get("conversation:s2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn plain_set_clears_previous_ttl() {
        let (_dir, store) = open_temp();
        store
            .set_with_ttl("k", b"old", Duration::from_secs(0))
            .await
            .unwrap();
        store.set("k", b"new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), b"new");
    }

    #[tokio::test]
    async fn set_membership_add_remove() {
        let (_dir, store) = open_temp();
        store.add_to_set("ids", "b").await.unwrap();
        store.add_to_set("ids", "a").await.unwrap();
        store.add_to_set("ids", "a").await.unwrap();
        assert_eq!(store.set_members("ids").await.unwrap(), vec!["a", "b"]);
        store.remove_from_set("ids", "b").await.unwrap();
        assert_eq!(store.set_members("ids").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn compare_and_swap_semantics() {
        let (_dir, store) = open_temp();
        assert!(store.compare_and_swap("v", None, 1).await.unwrap());
        assert!(!store.compare_and_swap("v", None, 5).await.unwrap());
        assert!(store.compare_and_swap("v", Some(1), 2).await.unwrap());
        assert!(!store.compare_and_swap("v", Some(1), 3).await.unwrap());
    }
}
