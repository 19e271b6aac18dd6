//! Consistent Hash Filter
//!
//! Orders candidates by rendezvous hashing on a routing key taken from the
//! filter extensions, so calls carrying the same key prefer the same
//! implementation and fail over along the same sequence.

use blake3::Hasher;
use broker_core::Implementation;
use serde_json::Value;

use super::{Rank, SelectionFilter, Verdict};
use crate::types::FilterExtensions;

/// Extension key read when none is configured
pub const DEFAULT_ROUTING_KEY: &str = "routingKey";

/// Rendezvous-hash ordering filter
pub struct ConsistentHash {
    /// Extension entry holding the routing key
    key_name: String,
}

impl ConsistentHash {
    pub fn new() -> Self {
        Self::with_key_name(DEFAULT_ROUTING_KEY)
    }

    pub fn with_key_name(key_name: impl Into<String>) -> Self {
        Self { key_name: key_name.into() }
    }

    /// Hash routing key and implementation id together using blake3
    fn score(routing_key: &str, implementation_id: &str) -> u64 {
        let mut hasher = Hasher::new();
        hasher.update(routing_key.as_bytes());
        hasher.update(b"\0");
        hasher.update(implementation_id.as_bytes());
        let hash = hasher.finalize();
        let bytes = hash.as_bytes();
        u64::from_le_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
            bytes[4], bytes[5], bytes[6], bytes[7],
        ])
    }

    fn routing_key(&self, extensions: &FilterExtensions) -> Option<String> {
        match extensions.get(&self.key_name)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

impl Default for ConsistentHash {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionFilter for ConsistentHash {
    fn evaluate(&self, candidate: &Implementation, extensions: &FilterExtensions) -> Verdict {
        let Some(routing_key) = self.routing_key(extensions) else {
            return Verdict::keep();
        };

        // Highest score first
        let score = Self::score(&routing_key, &candidate.id);
        let rank = i64::MAX - (score >> 1) as i64;
        Verdict { keep: true, rank: Rank::of(rank) }
    }

    fn name(&self) -> &'static str {
        "ConsistentHash"
    }
}
