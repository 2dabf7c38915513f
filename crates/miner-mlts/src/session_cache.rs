use std::collections::HashMap;
use std::sync::Mutex;

use crate::fernet::FernetKey;

#[derive(Clone)]
struct Entry {
    key: FernetKey,
    expires_at: i64,
}

pub enum Lookup {
    Live(FernetKey),
    Expired,
    Missing,
}

/// Mapping `(peer, uuid) -> (session key, expiration)` (§3). All mutation
/// goes through a single mutex; short critical sections only (§5).
pub struct SessionCache {
    entries: Mutex<HashMap<(String, String), Entry>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, peer: &str, uuid: &str, key: FernetKey, expires_at: i64) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert((peer.to_string(), uuid.to_string()), Entry { key, expires_at });
    }

    /// Returns the live key for `(peer, uuid)`, purging it first if expired.
    pub fn get(&self, peer: &str, uuid: &str, now_unix: i64) -> Option<FernetKey> {
        match self.lookup(peer, uuid, now_unix) {
            Lookup::Live(key) => Some(key),
            _ => None,
        }
    }

    /// Distinguishes "never existed" from "existed but expired" so callers
    /// can surface `SessionUnknown` vs `SessionExpired` (§7). An expired
    /// entry is purged as a side effect of the lookup.
    pub fn lookup(&self, peer: &str, uuid: &str, now_unix: i64) -> Lookup {
        let mut entries = self.entries.lock().unwrap();
        let map_key = (peer.to_string(), uuid.to_string());
        match entries.get(&map_key) {
            Some(entry) if entry.expires_at > now_unix => Lookup::Live(entry.key.clone()),
            Some(_) => {
                entries.remove(&map_key);
                Lookup::Expired
            }
            None => Lookup::Missing,
        }
    }

    /// Drops every entry whose expiration has passed.
    pub fn reap(&self, now_unix: i64) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now_unix);
        before - entries.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

impl Default for SessionCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_none_for_unknown_pair() {
        let cache = SessionCache::new();
        assert!(cache.get("peer", "uuid", 0).is_none());
    }

    #[test]
    fn get_purges_expired_entry() {
        let cache = SessionCache::new();
        let (_raw, key) = FernetKey::generate();
        cache.insert("peer", "uuid", key, 100);
        assert!(cache.get("peer", "uuid", 200).is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn reap_drops_only_expired() {
        let cache = SessionCache::new();
        let (_r1, k1) = FernetKey::generate();
        let (_r2, k2) = FernetKey::generate();
        cache.insert("peer", "live", k1, 1000);
        cache.insert("peer", "dead", k2, 0);
        let dropped = cache.reap(500);
        assert_eq!(dropped, 1);
        assert_eq!(cache.len(), 1);
    }
}
