//! Stored value types

use std::collections::{HashMap, HashSet, VecDeque};

use bytes::Bytes;

/// A value held under a key
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Hash(HashMap<Bytes, Bytes>),
    Set(HashSet<Bytes>),
    ZSet(SortedSet),
}

impl Value {
    /// Name reported by `TYPE`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Hash(_) => "hash",
            Value::Set(_) => "set",
            Value::ZSet(_) => "zset",
        }
    }

    /// Collections that became empty are removed from the keyspace
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::Str(_) => false,
            Value::List(l) => l.is_empty(),
            Value::Hash(h) => h.is_empty(),
            Value::Set(s) => s.is_empty(),
            Value::ZSet(z) => z.is_empty(),
        }
    }
}

/// Member → score map, ordered on demand
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortedSet {
    scores: HashMap<Bytes, f64>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update. Returns `true` if the member is new.
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        self.scores.insert(member, score).is_none()
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        self.scores.remove(member).is_some()
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        self.scores.get(member).copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Members from highest to lowest score; ties broken by member, descending
    pub fn descending(&self) -> Vec<(Bytes, f64)> {
        let mut entries: Vec<(Bytes, f64)> =
            self.scores.iter().map(|(m, s)| (m.clone(), *s)).collect();
        entries.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        entries
    }
}
