//! Keyspace Module
//!
//! In-memory key → value store with lazy millisecond expiry.
//!
//! ## Responsibilities
//! - Hold string, list, hash, set and sorted-set values
//! - Expire keys lazily on access
//! - Pattern matching and cursor iteration for `KEYS` / `SCAN`
//!
//! Not thread-safe on its own: the engine serializes access.

mod value;

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

pub use value::{SortedSet, Value};

/// Milliseconds since the Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    Missing,
    Persistent,
    Remaining(u64),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    /// Absolute expiry in epoch milliseconds
    expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The key → value map
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<Bytes, Entry>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys (expired ones included until touched)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_if_expired(&mut self, key: &[u8]) {
        let now = now_ms();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
        }
    }

    pub fn get(&mut self, key: &[u8]) -> Option<&Value> {
        self.purge_if_expired(key);
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut Value> {
        self.purge_if_expired(key);
        self.entries.get_mut(key).map(|e| &mut e.value)
    }

    /// Fetch the value under `key`, inserting `default()` when absent
    pub fn get_or_insert_with(&mut self, key: &Bytes, default: impl FnOnce() -> Value) -> &mut Value {
        self.purge_if_expired(key);
        &mut self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Entry { value: default(), expires_at: None })
            .value
    }

    pub fn contains(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Store `value`, replacing any previous value and expiry
    pub fn set(&mut self, key: Bytes, value: Value, expires_at: Option<u64>) {
        self.entries.insert(key, Entry { value, expires_at });
    }

    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.purge_if_expired(key);
        self.entries.remove(key).is_some()
    }

    /// Drop `key` if it holds an emptied collection
    pub fn remove_if_empty(&mut self, key: &[u8]) {
        if self.entries.get(key).is_some_and(|e| e.value.is_empty_collection()) {
            self.entries.remove(key);
        }
    }

    /// Set an absolute expiry. Returns `false` when the key does not exist.
    pub fn expire_at(&mut self, key: &[u8], at_ms: u64) -> bool {
        self.purge_if_expired(key);
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.expires_at = Some(at_ms);
                true
            }
            None => false,
        }
    }

    /// Stored absolute expiry of `key`, even if that moment has already passed
    pub fn expires_at(&self, key: &[u8]) -> Option<u64> {
        self.entries.get(key).and_then(|e| e.expires_at)
    }

    pub fn ttl(&mut self, key: &[u8]) -> Ttl {
        self.purge_if_expired(key);
        match self.entries.get(key) {
            None => Ttl::Missing,
            Some(Entry { expires_at: None, .. }) => Ttl::Persistent,
            Some(Entry { expires_at: Some(at), .. }) => Ttl::Remaining(at.saturating_sub(now_ms())),
        }
    }

    /// Live keys matching a glob pattern, sorted
    pub fn keys(&mut self, pattern: &[u8]) -> Vec<Bytes> {
        let now = now_ms();
        self.entries.retain(|_, e| !e.is_expired(now));
        let mut keys: Vec<Bytes> = self
            .entries
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// One page of a cursor scan over the sorted key list.
    ///
    /// Returns the next cursor (0 when done) and the matching keys of the page.
    pub fn scan(&mut self, cursor: usize, pattern: Option<&[u8]>, count: usize) -> (usize, Vec<Bytes>) {
        paginate(self.keys(b"*"), cursor, pattern, count)
    }
}

/// Cut one `SCAN`-style page out of a sorted item list.
///
/// The cursor is a plain position into `sorted`; `count` items are visited per
/// page and only those matching `pattern` are returned.
pub fn paginate(
    sorted: Vec<Bytes>,
    cursor: usize,
    pattern: Option<&[u8]>,
    count: usize,
) -> (usize, Vec<Bytes>) {
    let end = cursor.saturating_add(count.max(1)).min(sorted.len());
    let page = sorted
        .get(cursor..end)
        .unwrap_or(&[])
        .iter()
        .filter(|item| pattern.map_or(true, |p| glob_match(p, item)))
        .cloned()
        .collect();
    let next = if end >= sorted.len() { 0 } else { end };
    (next, page)
}

/// Glob matching with `*`, `?` and `\` escapes
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some(b'*') => {
                backtrack = Some((p, t));
                p += 1;
                continue;
            }
            Some(b'?') => {
                p += 1;
                t += 1;
                continue;
            }
            Some(b'\\') if p + 1 < pattern.len() && pattern[p + 1] == text[t] => {
                p += 2;
                t += 1;
                continue;
            }
            Some(&c) if c != b'\\' && c == text[t] => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star_p, star_t)) => {
                backtrack = Some((star_p, star_t + 1));
                p = star_p + 1;
                t = star_t + 1;
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
