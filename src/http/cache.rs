use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::Envelope;

#[derive(Debug, Clone)]
struct CacheEntry {
    envelope: Envelope,
    expires_at: Instant,
}

/// TTL-bounded response cache keyed by fully-resolved URL.
///
/// Lookups are synchronous; expired entries are dropped lazily on access and
/// overwritten on refetch. A stored envelope is handed back unchanged until
/// its expiry, so a hit is structurally identical to the fetch that
/// populated it.
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

    pub fn get(&self, key: &str) -> Option<Envelope> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.envelope.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: String, envelope: Envelope) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CacheEntry {
                    envelope,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(data: serde_json::Value) -> Envelope {
        Envelope {
            data,
            ..Envelope::default()
        }
    }

    #[test]
    fn live_entry_round_trips_unchanged() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let stored = envelope(json!([{"id": "1"}]));
        cache.insert("k".into(), stored.clone());
        assert_eq!(cache.get("k"), Some(stored));
    }

    #[test]
    fn zero_ttl_entry_is_expired_on_lookup() {
        let cache = ResponseCache::new(Duration::ZERO);
        cache.insert("k".into(), envelope(json!({})));
        assert_eq!(cache.get("k"), None);
        // The expired entry was dropped, not just hidden.
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn insert_overwrites_previous_entry() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.insert("k".into(), envelope(json!({"v": 1})));
        cache.insert("k".into(), envelope(json!({"v": 2})));
        let hit = cache.get("k").map(|e| e.data);
        assert_eq!(hit, Some(json!({"v": 2})));
    }
}
