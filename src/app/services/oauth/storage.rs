use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// C3's storage abstraction: opaque, TTL-keyed records, put/get/remove
/// (spec §2 "Entity storage abstraction", §3 "Ownership: storage entries
/// are owned by the core and destroyed by TTL or by explicit remove on
/// consumption"). Production backends (Postgres, Redis) implement the
/// same shape outside this crate; this one is the in-memory reference
/// used by tests and local development.
pub struct EntityStore<V: Clone + Send + Sync> {
    entries: DashMap<String, StoredEntry<V>>,
}

#[derive(Clone)]
struct StoredEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

impl<V: Clone + Send + Sync> Default for EntityStore<V> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<V: Clone + Send + Sync> EntityStore<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: impl Into<String>, value: V, now: DateTime<Utc>, ttl: chrono::Duration) {
        self.entries.insert(
            key.into(),
            StoredEntry {
                value,
                expires_at: now + ttl,
            },
        );
    }

    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.expires_at <= now {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.remove(key).map(|(_, e)| e.value)
    }

    /// Consuming lookup: get-and-delete under the normal policy (spec
    /// §4.11 "Lookup MUST be consuming").
    pub fn take(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let (_, entry) = self.entries.remove(key)?;
        if entry.expires_at <= now {
            return None;
        }
        Some(entry.value)
    }

    /// Mutates an entry in place without changing its expiry, used by the
    /// grant-fingerprint append on token issuance and by CIBA status
    /// transitions.
    pub fn mutate(&self, key: &str, now: DateTime<Utc>, f: impl FnOnce(&mut V)) -> bool {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.expires_at <= now,
            None => return false,
        };
        if expired {
            self.entries.remove(key);
            return false;
        }
        if let Some(mut entry) = self.entries.get_mut(key) {
            f(&mut entry.value);
            true
        } else {
            false
        }
    }

    /// Re-inserts a value under its original key with a fresh TTL,
    /// without needing a separate `put` call that forgets context (used
    /// by the authorization-code reuse-prevention decorator, spec
    /// §4.11).
    pub fn reinsert(&self, key: impl Into<String>, value: V, now: DateTime<Utc>, ttl: chrono::Duration) {
        self.put(key, value, now, ttl);
    }

    pub fn sweep_expired(&self, now: DateTime<Utc>) {
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_entries_are_invisible_to_get() {
        let store: EntityStore<String> = EntityStore::new();
        let now = Utc::now();
        store.put("key", "value".to_string(), now, chrono::Duration::seconds(1));
        assert_eq!(store.get("key", now), Some("value".to_string()));
        assert_eq!(store.get("key", now + chrono::Duration::seconds(2)), None);
    }

    #[test]
    fn take_is_consuming() {
        let store: EntityStore<String> = EntityStore::new();
        let now = Utc::now();
        store.put("key", "value".to_string(), now, chrono::Duration::seconds(60));
        assert_eq!(store.take("key", now), Some("value".to_string()));
        assert_eq!(store.take("key", now), None);
    }

    #[test]
    fn take_rejects_already_expired_entry() {
        let store: EntityStore<String> = EntityStore::new();
        let now = Utc::now();
        store.put("key", "value".to_string(), now, chrono::Duration::seconds(1));
        assert_eq!(store.take("key", now + chrono::Duration::seconds(2)), None);
    }

    #[test]
    fn mutate_updates_value_in_place() {
        let store: EntityStore<Vec<i32>> = EntityStore::new();
        let now = Utc::now();
        store.put("key", vec![1], now, chrono::Duration::seconds(60));
        let mutated = store.mutate("key", now, |v| v.push(2));
        assert!(mutated);
        assert_eq!(store.get("key", now), Some(vec![1, 2]));
    }

    #[test]
    fn sweep_removes_only_expired_entries() {
        let store: EntityStore<i32> = EntityStore::new();
        let now = Utc::now();
        store.put("a", 1, now, chrono::Duration::seconds(1));
        store.put("b", 2, now, chrono::Duration::seconds(60));
        store.sweep_expired(now + chrono::Duration::seconds(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("b", now), Some(2));
    }
}
