use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

/// In-memory store for rendered assets, owned for the life of the
/// process. Every entry carries the version tag it was rendered under
/// and a freshness deadline; entries from another version never hit.
#[derive(Debug)]
pub struct AssetCache {
    version: String,
    ttl: Duration,
    enabled: bool,
    inner: RwLock<HashMap<String, Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    body: Arc<String>,
    version: String,
    fresh_until: DateTime<Utc>,
}

impl AssetCache {
    #[must_use]
    pub fn open(version: impl Into<String>, ttl: Duration, enabled: bool) -> Self {
        Self {
            version: version.into(),
            ttl,
            enabled,
            inner: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Fetches a fresh, same-version entry. `now` is explicit so
    /// freshness is reproducible in tests.
    pub async fn get(&self, key: &str, now: DateTime<Utc>) -> Option<Arc<String>> {
        if !self.enabled {
            return None;
        }

        let inner = self.inner.read().await;
        let entry = inner.get(key)?;
        if entry.version != self.version || entry.fresh_until <= now {
            return None;
        }
        Some(Arc::clone(&entry.body))
    }

    /// Stores a rendered body under the store's current version and
    /// returns it shared. Disabled stores pass the body through.
    pub async fn insert(&self, key: String, body: String, now: DateTime<Utc>) -> Arc<String> {
        let body = Arc::new(body);
        if !self.enabled {
            return body;
        }

        let entry = Entry {
            body: Arc::clone(&body),
            version: self.version.clone(),
            fresh_until: now + self.ttl,
        };
        self.inner.write().await.insert(key, entry);
        body
    }

    /// Drops every entry that is expired or was stored under another
    /// version. Returns how many entries were removed.
    pub async fn purge_stale(&self, now: DateTime<Utc>) -> usize {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|_, entry| entry.version == self.version && entry.fresh_until > now);
        before - inner.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::AssetCache;

    fn base_now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0)
            .single()
            .expect("valid now")
    }

    #[tokio::test]
    async fn fresh_entries_hit() {
        let cache = AssetCache::open("v1", Duration::seconds(60), true);
        let now = base_now();

        cache.insert("page".to_string(), "<html>".to_string(), now).await;
        let hit = cache.get("page", now + Duration::seconds(30)).await;
        assert_eq!(hit.as_deref().map(String::as_str), Some("<html>"));
    }

    #[tokio::test]
    async fn expired_entries_miss() {
        let cache = AssetCache::open("v1", Duration::seconds(60), true);
        let now = base_now();

        cache.insert("page".to_string(), "<html>".to_string(), now).await;
        assert!(cache.get("page", now + Duration::seconds(60)).await.is_none());
    }

    #[tokio::test]
    async fn other_versions_miss_and_purge() {
        let now = base_now();
        let old = AssetCache::open("v1", Duration::seconds(60), true);
        old.insert("grid".to_string(), "old".to_string(), now).await;

        // Same backing map under a bumped version tag.
        let bumped = AssetCache {
            version: "v2".to_string(),
            ..old
        };
        assert!(bumped.get("grid", now).await.is_none());
        assert_eq!(bumped.purge_stale(now).await, 1);
        assert_eq!(bumped.purge_stale(now).await, 0);
    }

    #[tokio::test]
    async fn disabled_store_never_stores() {
        let cache = AssetCache::open("v1", Duration::seconds(60), false);
        let now = base_now();

        let body = cache
            .insert("page".to_string(), "<html>".to_string(), now)
            .await;
        assert_eq!(body.as_str(), "<html>");
        assert!(cache.get("page", now).await.is_none());
    }
}
