// ── File-backed TTL cache ──
//
// One JSON file per key under the configured directory. Entries carry
// their own stored-at timestamp and TTL, so freshness semantics hold
// across process restarts.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    value: T,
    stored_at: DateTime<Utc>,
    ttl_ms: u64,
}

impl<T> CacheEntry<T> {
    /// Readable only while `now < stored_at + ttl`; exactly
    /// `stored_at + ttl` counts as expired.
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let ttl = i64::try_from(self.ttl_ms)
            .ok()
            .and_then(TimeDelta::try_milliseconds)
            .unwrap_or(TimeDelta::MAX);
        self.stored_at
            .checked_add_signed(ttl)
            .is_none_or(|deadline| now < deadline)
    }
}

/// Durable key/value store with per-entry TTL.
///
/// `get` treats never-set, expired, and unreadable entries alike --
/// callers see `None` and cannot tell which it was. The key space is
/// tiny (a couple of logical keys), so there is no eviction beyond
/// TTL expiry and no capacity bound.
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read a value if a fresh entry exists for `key`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = tokio::fs::read(self.path_for(key)).await.ok()?;
        let entry: CacheEntry<T> = match serde_json::from_slice(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "discarding unreadable cache entry");
                return None;
            }
        };
        if entry.is_fresh(Utc::now()) {
            Some(entry.value)
        } else {
            debug!(key, "cache entry expired");
            None
        }
    }

    /// Store a value, overwriting any prior entry and restarting the
    /// TTL clock. The entry is written to a temp file and renamed into
    /// place so readers never observe a partial write.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), Error> {
        let entry = CacheEntry {
            value,
            stored_at: Utc::now(),
            ttl_ms: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        };
        let raw = serde_json::to_vec(&entry)
            .map_err(|e| Error::Cache(io::Error::new(io::ErrorKind::InvalidData, e)))?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(key, ttl_ms = entry.ttl_ms, "cache entry written");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn freshness_boundary_is_exclusive() {
        let stored_at = Utc::now();
        let entry = CacheEntry {
            value: "v",
            stored_at,
            ttl_ms: 5_000,
        };

        assert!(entry.is_fresh(stored_at));
        assert!(entry.is_fresh(stored_at + TimeDelta::milliseconds(4_999)));
        // Exactly elapsed == ttl is expired.
        assert!(!entry.is_fresh(stored_at + TimeDelta::milliseconds(5_000)));
        assert!(!entry.is_fresh(stored_at + TimeDelta::milliseconds(5_001)));
    }

    #[tokio::test]
    async fn get_returns_what_set_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();

        store
            .set(
                "device-list",
                &["a".to_owned(), "b".to_owned()],
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        let read: Vec<String> = store.get("device-list").await.unwrap();
        assert_eq!(read, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn missing_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();

        assert_eq!(store.get::<String>("never-set").await, None);
    }

    #[tokio::test]
    async fn expired_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();

        store
            .set("device-list", &"stale".to_owned(), Duration::from_millis(30))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(store.get::<String>("device-list").await, None);
    }

    #[tokio::test]
    async fn set_overwrites_and_resets_the_clock() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();

        store
            .set("device-list", &"old".to_owned(), Duration::from_millis(30))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        store
            .set("device-list", &"new".to_owned(), Duration::from_millis(100))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        // Past the first entry's deadline but inside the second's.
        assert_eq!(
            store.get::<String>("device-list").await.as_deref(),
            Some("new")
        );
    }

    #[tokio::test]
    async fn entries_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CacheStore::open(dir.path()).unwrap();
            store
                .set("auth", &"session".to_owned(), Duration::from_secs(60))
                .await
                .unwrap();
        }

        let reopened = CacheStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get::<String>("auth").await.as_deref(),
            Some("session")
        );
    }

    #[tokio::test]
    async fn corrupt_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();

        tokio::fs::write(dir.path().join("device-list.json"), b"{not json")
            .await
            .unwrap();

        assert_eq!(store.get::<String>("device-list").await, None);
    }
}
