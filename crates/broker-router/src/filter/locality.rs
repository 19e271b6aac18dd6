//! Ordering filters based on implementation attributes
//!
//! Neither filter drops candidates; they only reorder them.

use broker_core::Implementation;

use super::{SelectionFilter, Verdict};
use crate::types::FilterExtensions;

/// Ranks in-process implementations ahead of remote ones
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferLocal;

impl SelectionFilter for PreferLocal {
    fn evaluate(&self, candidate: &Implementation, _extensions: &FilterExtensions) -> Verdict {
        Verdict::ranked(if candidate.is_local() { 0 } else { 1 })
    }

    fn name(&self) -> &'static str {
        "PreferLocal"
    }
}

/// Ranks implementations by descending weight
///
/// Zero-weight implementations are dropped unless `keep_zero` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightOrder {
    keep_zero: bool,
}

impl WeightOrder {
    pub fn new() -> Self {
        Self { keep_zero: false }
    }

    /// Keep zero-weight implementations at the end instead of dropping them
    pub fn keeping_zero_weight() -> Self {
        Self { keep_zero: true }
    }
}

impl SelectionFilter for WeightOrder {
    fn evaluate(&self, candidate: &Implementation, _extensions: &FilterExtensions) -> Verdict {
        if candidate.weight == 0 && !self.keep_zero {
            return Verdict::drop();
        }
        Verdict::ranked(-i64::from(candidate.weight))
    }

    fn name(&self) -> &'static str {
        "WeightOrder"
    }
}
