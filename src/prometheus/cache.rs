use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Raw response body cached for one request URL
#[derive(Debug, Clone)]
struct CacheEntry {
    body: Arc<str>,
    stored_at: Instant,
}

/// Short-lived cache of successful response bodies, keyed by full request URL.
///
/// All access goes through one mutex that is only held for map operations,
/// never across an HTTP request, so concurrent queries still hit the network
/// in parallel.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh body for `key`, if any. Expired entries are dropped on sight.
    pub async fn get(&self, key: &str) -> Option<Arc<str>> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(Arc::clone(&entry.body)),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub async fn insert(&self, key: String, body: Arc<str>) {
        if self.ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let ttl = self.ttl;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < ttl);
        entries.insert(
            key,
            CacheEntry {
                body,
                stored_at: now,
            },
        );
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
