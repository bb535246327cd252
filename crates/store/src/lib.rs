//! Key-value persistence abstraction.
//!
//! The coach core only ever needs five primitives from its store: get, set
//! (optionally with a TTL), delete, set membership, and a compare-and-swap on
//! a version counter.  Everything above this trait treats records as opaque
//! JSON blobs.  Two backends ship: an in-process [`MemoryStore`] for tests and
//! ephemeral runs, and a [`RedbStore`] for durable single-node deployments.

use std::time::Duration;

use async_trait::async_trait;

mod memory;
mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Compare-and-swap failed: another writer saved the collection since it
    /// was loaded.  Callers should reload and retry rather than overwrite.
    #[error("version conflict on {0}: collection was modified concurrently")]
    VersionConflict(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Shorthand for wrapping backend-specific failures.
pub(crate) fn backend(err: impl std::fmt::Display) -> StoreError {
    StoreError::Backend(err.to_string())
}

/// Minimal key-value contract the repository layer is written against.
///
/// Values are opaque byte blobs; sets hold string member ids.  TTL-carrying
/// values disappear from reads after their expiry (backends may reap lazily).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError>;

    /// Atomically replace the `u64` counter at `key` with `next`, but only if
    /// its current value equals `expected` (`None` = key absent).  Returns
    /// `true` when the swap happened.  This is the only cross-key coordination
    /// primitive the core relies on; everything else is last-write-wins.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<u64>,
        next: u64,
    ) -> Result<bool, StoreError>;
}
