//! Tag Match Filter
//!
//! Keeps implementations whose tags agree with every extension entry under a
//! key prefix. With the default prefix `tag.`, an extension `tag.region = "eu"`
//! keeps only implementations tagged `region = "eu"`.

use broker_core::Implementation;
use serde_json::Value;

use super::{SelectionFilter, Verdict};
use crate::types::FilterExtensions;

pub const DEFAULT_TAG_PREFIX: &str = "tag.";

pub struct TagMatch {
    prefix: String,
}

impl TagMatch {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_TAG_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }
}

impl Default for TagMatch {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectionFilter for TagMatch {
    fn evaluate(&self, candidate: &Implementation, extensions: &FilterExtensions) -> Verdict {
        let matches = extensions
            .iter()
            .filter_map(|(key, value)| Some((key.strip_prefix(self.prefix.as_str())?, value)))
            .all(|(tag, expected)| {
                let Some(actual) = candidate.tags.get(tag) else {
                    return false;
                };
                match expected {
                    Value::String(s) => actual == s,
                    // Non-string expectations compare against their JSON rendering
                    other => *actual == other.to_string(),
                }
            });
        Verdict::keep_if(matches)
    }

    fn name(&self) -> &'static str {
        "TagMatch"
    }
}
