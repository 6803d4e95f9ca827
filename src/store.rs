use std::collections::HashMap;
use std::time::Duration;

use crate::time::now_millis;

type Key = String;

/// The Store holds the keyspace: key-value pairs plus, for some of the keys, an absolute
/// expiration timestamp in milliseconds since the Unix epoch.
///
/// Every key in `expirations` is also present in `values`. Reads treat a key whose expiration
/// has elapsed as missing, but only [`Store::remove_expired_keys`] ever deletes a key for
/// having expired.
///
/// The store is owned by the event loop and mutated by one caller at a time, so it needs no
/// locking.
#[derive(Debug, Default)]
pub struct Store {
    values: HashMap<Key, String>,
    expirations: HashMap<Key, Expiration>,
    // Keys with an expiration, in the order the expiration sweep visits them.
    volatile_keys: Vec<Key>,
    // Index into `volatile_keys` of the next key the sweep looks at.
    sweep_cursor: usize,
}

#[derive(Debug, Clone, Copy)]
struct Expiration {
    /// Milliseconds since the Unix epoch.
    at: u64,
    /// Position of the key in `volatile_keys`.
    slot: usize,
}

/// Remaining time to live of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key does not exist, or has expired.
    Missing,
    /// The key exists and has no expiration.
    Persistent,
    Remaining(Duration),
}

impl Store {
    pub fn new() -> Store {
        Store::default()
    }

    /// Sets `key` to `value`, discarding any expiration the key had.
    pub fn set(&mut self, key: String, value: String) {
        self.remove_expiration(&key);
        self.values.insert(key, value);
    }

    /// Sets `key` to `value`, expiring at the absolute timestamp `expires_at` (milliseconds
    /// since the Unix epoch).
    pub fn set_with_expiration(&mut self, key: String, value: String, expires_at: u64) {
        match self.expirations.get_mut(&key) {
            Some(expiration) => expiration.at = expires_at,
            None => {
                let slot = self.volatile_keys.len();
                self.volatile_keys.push(key.clone());
                self.expirations.insert(
                    key.clone(),
                    Expiration {
                        at: expires_at,
                        slot,
                    },
                );
            }
        }
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        if self.is_expired(key, now_millis()) {
            return None;
        }
        self.values.get(key).map(String::as_str)
    }

    pub fn ttl(&self, key: &str) -> Ttl {
        let now = now_millis();
        if !self.values.contains_key(key) || self.is_expired(key, now) {
            return Ttl::Missing;
        }

        match self.expires_at(key) {
            Some(expires_at) => Ttl::Remaining(Duration::from_millis(expires_at - now)),
            None => Ttl::Persistent,
        }
    }

    pub fn expires_at(&self, key: &str) -> Option<u64> {
        self.expirations.get(key).map(|expiration| expiration.at)
    }

    /// Number of keys held, including expired keys the sweep has not reached yet.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// Number of keys with an expiration.
    pub fn volatile_size(&self) -> usize {
        self.expirations.len()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn is_expired(&self, key: &str, now: u64) -> bool {
        self.expires_at(key).is_some_and(|expires_at| expires_at <= now)
    }

    /// Drops the expiration of `key`, if any. The last volatile key takes over its slot.
    fn remove_expiration(&mut self, key: &str) {
        let Some(Expiration { slot, .. }) = self.expirations.remove(key) else {
            return;
        };

        self.volatile_keys.swap_remove(slot);
        if let Some(moved) = self.volatile_keys.get(slot) {
            if let Some(expiration) = self.expirations.get_mut(moved) {
                expiration.slot = slot;
            }
        }
    }

    /// Active expiration. Inspects at most `max_keys` keys that have an expiration and removes
    /// the ones that expired at or before `now`. Returns how many keys were removed.
    ///
    /// Successive calls walk the expiring keys round robin from where the previous call
    /// stopped, so the work of one call depends on `max_keys` only, never on the size of the
    /// keyspace.
    pub fn remove_expired_keys(&mut self, now: u64, max_keys: usize) -> usize {
        let mut removed = 0;

        for _ in 0..max_keys {
            let Some(key) = self.volatile_keys.get(self.sweep_cursor) else {
                break;
            };

            if !self.is_expired(key, now) {
                self.sweep_cursor += 1;
                continue;
            }

            // The last volatile key moves into the cursor slot and is looked at next.
            let key = key.clone();
            self.remove_expiration(&key);
            self.values.remove(&key);
            removed += 1;
        }

        if self.sweep_cursor >= self.volatile_keys.len() {
            self.sweep_cursor = 0;
        }

        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_expirations_are_tracked_keys(store: &Store) {
        assert_eq!(store.expirations.len(), store.volatile_keys.len());
        for (key, expiration) in &store.expirations {
            assert!(store.values.contains_key(key), "{key} has no value");
            assert_eq!(&store.volatile_keys[expiration.slot], key);
        }
    }

    #[test]
    fn set_and_get() {
        let mut store = Store::new();

        store.set("key1".to_string(), "value1".to_string());

        assert_eq!(store.get("key1"), Some("value1"));
        assert_eq!(store.get("key2"), None);
        assert_eq!(store.ttl("key1"), Ttl::Persistent);
        assert_eq!(store.ttl("key2"), Ttl::Missing);
    }

    #[test]
    fn set_clears_expiration() {
        let mut store = Store::new();

        store.set_with_expiration("key1".to_string(), "1".to_string(), now_millis() + 10_000);
        assert!(matches!(store.ttl("key1"), Ttl::Remaining(_)));

        store.set("key1".to_string(), "2".to_string());
        assert_eq!(store.ttl("key1"), Ttl::Persistent);
        assert_eq!(store.volatile_size(), 0);
    }

    #[test]
    fn expired_key_reads_as_missing_until_swept() {
        let mut store = Store::new();

        store.set_with_expiration("key1".to_string(), "1".to_string(), now_millis() - 1);

        assert_eq!(store.get("key1"), None);
        assert_eq!(store.ttl("key1"), Ttl::Missing);
        // Reads never delete.
        assert!(store.contains_key("key1"));

        let removed = store.remove_expired_keys(now_millis(), 20);

        assert_eq!(removed, 1);
        assert!(!store.contains_key("key1"));
        assert_eq!(store.expires_at("key1"), None);
    }

    #[test]
    fn remaining_ttl() {
        let mut store = Store::new();

        store.set_with_expiration("key1".to_string(), "1".to_string(), now_millis() + 10_000);

        match store.ttl("key1") {
            Ttl::Remaining(remaining) => {
                assert!(remaining <= Duration::from_secs(10));
                assert!(remaining > Duration::from_secs(9));
            }
            ttl => panic!("unexpected ttl {ttl:?}"),
        }
    }

    #[test]
    fn sweep_keeps_live_and_persistent_keys() {
        let mut store = Store::new();
        let now = now_millis();

        store.set("persistent".to_string(), "1".to_string());
        store.set_with_expiration("live".to_string(), "2".to_string(), now + 60_000);
        store.set_with_expiration("expired".to_string(), "3".to_string(), now - 1);

        let removed = store.remove_expired_keys(now, 20);

        assert_eq!(removed, 1);
        assert_eq!(store.size(), 2);
        assert!(store.contains_key("persistent"));
        assert!(store.contains_key("live"));
        assert_expirations_are_tracked_keys(&store);
    }

    #[test]
    fn sweep_is_capped_per_call() {
        let mut store = Store::new();
        let now = now_millis();

        for i in 0..50 {
            store.set_with_expiration(format!("key:{i}"), "gone".to_string(), now - 1);
        }

        assert_eq!(store.remove_expired_keys(now, 20), 20);
        assert_eq!(store.size(), 30);
        assert_eq!(store.remove_expired_keys(now, 20), 20);
        assert_eq!(store.remove_expired_keys(now, 20), 10);
        assert_eq!(store.remove_expired_keys(now, 20), 0);
        assert_eq!(store.size(), 0);
        assert_expirations_are_tracked_keys(&store);
    }

    #[test]
    fn sweep_reaches_keys_behind_live_ones() {
        let mut store = Store::new();
        let now = now_millis();

        for i in 0..100 {
            store.set_with_expiration(format!("live:{i}"), "stay".to_string(), now + 60_000);
        }
        for i in 0..10 {
            store.set_with_expiration(format!("expired:{i}"), "gone".to_string(), now - 1);
        }

        // 110 volatile keys, 20 inspected per call: every key is visited within 6 calls.
        let mut removed = 0;
        for _ in 0..6 {
            let removed_now = store.remove_expired_keys(now, 20);
            assert!(removed_now <= 20);
            removed += removed_now;
        }

        assert_eq!(removed, 10);
        assert_eq!(store.size(), 100);
        assert!((0..10).all(|i| !store.contains_key(&format!("expired:{i}"))));
        assert_expirations_are_tracked_keys(&store);
    }

    #[test]
    fn sweep_resumes_where_the_previous_call_stopped() {
        let mut store = Store::new();
        let now = now_millis();

        for i in 0..10_000 {
            store.set_with_expiration(format!("live:{i}"), "stay".to_string(), now + 60_000);
        }

        for _ in 0..10 {
            assert_eq!(store.remove_expired_keys(now, 20), 0);
        }
        assert_eq!(store.sweep_cursor, 200);

        for i in 0..5 {
            store.set_with_expiration(format!("expired:{i}"), "gone".to_string(), now - 1);
        }

        // Starting near the end, one call looks at the last 10 live keys and the 5 expired
        // ones after them, then wraps.
        store.sweep_cursor = 9_990;
        assert_eq!(store.remove_expired_keys(now, 20), 5);
        assert_eq!(store.sweep_cursor, 0);
        assert_eq!(store.size(), 10_000);
        assert_expirations_are_tracked_keys(&store);
    }

    #[test]
    fn expirations_stay_consistent_across_updates() {
        let mut store = Store::new();
        let now = now_millis();

        for i in 0..10 {
            store.set_with_expiration(format!("key:{i}"), "1".to_string(), now + 60_000);
        }
        // Refreshing an expiration keeps a single entry for the key.
        store.set_with_expiration("key:3".to_string(), "2".to_string(), now + 1_000);
        // Dropping expirations moves other keys between slots.
        store.set("key:0".to_string(), "3".to_string());
        store.set("key:5".to_string(), "3".to_string());

        assert_eq!(store.volatile_size(), 8);
        assert_eq!(store.expires_at("key:3"), Some(now + 1_000));
        assert_eq!(store.expires_at("key:0"), None);
        assert_expirations_are_tracked_keys(&store);

        assert_eq!(store.remove_expired_keys(now + 1_000, 20), 1);
        assert!(!store.contains_key("key:3"));
        assert_eq!(store.size(), 9);
        assert_expirations_are_tracked_keys(&store);
    }
}
