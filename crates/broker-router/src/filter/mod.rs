//! Selection Filters
//!
//! A selection filter looks at one candidate plus the call's filter
//! extensions and decides whether to keep it and where to rank it.
//! Filters compose by conjunction: a candidate must be kept by every
//! filter, and its rank is the concatenation of the individual ranks.
//! Every filter fills exactly one key slot, so keys from different
//! filters are never compared against each other.
//!
//! - `PreferLocal`: in-process implementations before remote ones
//! - `WeightOrder`: higher weight first
//! - `TagMatch`: keep implementations whose tags match the extensions
//! - `ConsistentHash`: stable per-key ordering (rendezvous hashing)
//!
//! # Filtering Pipeline
//!
//! ```text
//! candidates (enumeration order)
//!     │
//!     ▼
//! ┌─────────────────────────┐
//! │   evaluate each         │  keep? + rank
//! └───────────┬─────────────┘
//!             │
//!             ▼
//! ┌─────────────────────────┐
//! │   stable sort by rank   │  ties keep enumeration order
//! └─────────────────────────┘
//! ```

mod consistent_hash;
mod locality;
mod tag_match;

pub use consistent_hash::ConsistentHash;
pub use locality::{PreferLocal, WeightOrder};
pub use tag_match::TagMatch;

use std::sync::Arc;

use broker_core::Implementation;
use tracing::trace;

use crate::types::FilterExtensions;

/// Lexicographic ranking key; lower ranks are dispatched first
///
/// A filter's rank is one key. The neutral rank is the key `0`, so an
/// unranked candidate sorts after negative keys and before positive ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Rank(Vec<i64>);

impl Default for Rank {
    fn default() -> Self {
        Self::neutral()
    }
}

impl Rank {
    pub const NEUTRAL_KEY: i64 = 0;

    /// Rank that leaves the enumeration order untouched
    pub fn neutral() -> Self {
        Self(vec![Self::NEUTRAL_KEY])
    }

    pub fn of(key: i64) -> Self {
        Self(vec![key])
    }

    /// Append `other` as a lower-priority component
    pub fn then(mut self, other: Rank) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn keys(&self) -> &[i64] {
        &self.0
    }
}

/// Outcome of evaluating one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub keep: bool,
    pub rank: Rank,
}

impl Verdict {
    pub fn keep() -> Self {
        Self { keep: true, rank: Rank::neutral() }
    }

    pub fn drop() -> Self {
        Self { keep: false, rank: Rank::neutral() }
    }

    pub fn ranked(key: i64) -> Self {
        Self { keep: true, rank: Rank::of(key) }
    }

    pub fn keep_if(condition: bool) -> Self {
        if condition {
            Self::keep()
        } else {
            Self::drop()
        }
    }
}

/// Trait for candidate selection filters
///
/// Implementations must be pure: the same candidate and extensions
/// always yield the same verdict.
pub trait SelectionFilter: Send + Sync {
    /// Decide whether to keep `candidate` and how to rank it
    fn evaluate(&self, candidate: &Implementation, extensions: &FilterExtensions) -> Verdict;

    /// Filter name for logging
    fn name(&self) -> &'static str;
}

/// Conjunction of several filters
///
/// Membership does not depend on the order of the filters. Ranking does:
/// the first filter's key is the primary sort key, the next one breaks
/// its ties, and so on.
pub struct Conjunction {
    filters: Vec<Arc<dyn SelectionFilter>>,
}

impl Conjunction {
    pub fn new(filters: Vec<Arc<dyn SelectionFilter>>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl SelectionFilter for Conjunction {
    fn evaluate(&self, candidate: &Implementation, extensions: &FilterExtensions) -> Verdict {
        let mut rank = Rank(Vec::with_capacity(self.filters.len()));
        for filter in &self.filters {
            let verdict = filter.evaluate(candidate, extensions);
            if !verdict.keep {
                return Verdict::drop();
            }
            rank = rank.then(verdict.rank);
        }
        Verdict { keep: true, rank }
    }

    fn name(&self) -> &'static str {
        "Conjunction"
    }
}

/// Combine an existing filter with another so both must hold
pub fn combine(
    existing: Option<Arc<dyn SelectionFilter>>,
    next: Arc<dyn SelectionFilter>,
) -> Arc<dyn SelectionFilter> {
    match existing {
        None => next,
        Some(existing) => Arc::new(Conjunction::new(vec![existing, next])),
    }
}

/// Filter backed by a closure
pub struct FnFilter<F> {
    name: &'static str,
    f: F,
}

impl<F> SelectionFilter for FnFilter<F>
where
    F: Fn(&Implementation, &FilterExtensions) -> Verdict + Send + Sync,
{
    fn evaluate(&self, candidate: &Implementation, extensions: &FilterExtensions) -> Verdict {
        (self.f)(candidate, extensions)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Wrap a closure as a shareable selection filter
pub fn filter_fn<F>(name: &'static str, f: F) -> Arc<dyn SelectionFilter>
where
    F: Fn(&Implementation, &FilterExtensions) -> Verdict + Send + Sync + 'static,
{
    Arc::new(FnFilter { name, f })
}

/// Narrow and order `candidates`
///
/// Dropped candidates are removed; the rest are stable-sorted by rank,
/// so equal ranks keep their enumeration order.
pub fn apply(
    filter: &dyn SelectionFilter,
    candidates: Vec<Implementation>,
    extensions: &FilterExtensions,
) -> Vec<Implementation> {
    let mut ranked: Vec<(Rank, Implementation)> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let verdict = filter.evaluate(&candidate, extensions);
            trace!(
                filter = filter.name(),
                implementation_id = %candidate.id,
                keep = verdict.keep,
                rank = ?verdict.rank.keys(),
                "Evaluated candidate"
            );
            verdict.keep.then(|| (verdict.rank, candidate))
        })
        .collect();

    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked.into_iter().map(|(_, candidate)| candidate).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(ids: &[&str]) -> Vec<Implementation> {
        ids.iter().map(|id| Implementation::remote("c", *id)).collect()
    }

    fn ids(list: &[Implementation]) -> Vec<&str> {
        list.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_apply_is_stable_for_equal_ranks() {
        let keep_all = filter_fn("keep", |_, _| Verdict::keep());
        let result = apply(keep_all.as_ref(), candidates(&["a", "b", "c"]), &FilterExtensions::new());
        assert_eq!(ids(&result), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_apply_orders_by_rank() {
        let reverse = filter_fn("reverse", |c, _| match c.id.as_str() {
            "a" => Verdict::ranked(3),
            "b" => Verdict::ranked(1),
            _ => Verdict::ranked(2),
        });
        let result = apply(reverse.as_ref(), candidates(&["a", "b", "c"]), &FilterExtensions::new());
        assert_eq!(ids(&result), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_conjunction_requires_both() {
        let not_a = filter_fn("not-a", |c, _| Verdict::keep_if(c.id != "a"));
        let not_c = filter_fn("not-c", |c, _| Verdict::keep_if(c.id != "c"));

        let ab = combine(Some(not_a.clone()), not_c.clone());
        let ba = combine(Some(not_c), not_a);

        let ext = FilterExtensions::new();
        assert_eq!(ids(&apply(ab.as_ref(), candidates(&["a", "b", "c"]), &ext)), vec!["b"]);
        assert_eq!(ids(&apply(ba.as_ref(), candidates(&["a", "b", "c"]), &ext)), vec!["b"]);
    }

    #[test]
    fn test_conjunction_concatenates_ranks() {
        let primary = filter_fn("primary", |c, _| Verdict::ranked(if c.id == "c" { 0 } else { 1 }));
        let secondary = filter_fn("secondary", |c, _| Verdict::ranked(if c.id == "b" { 0 } else { 1 }));
        let combined = combine(Some(primary), secondary);

        let result = apply(combined.as_ref(), candidates(&["a", "b", "c"]), &FilterExtensions::new());
        assert_eq!(ids(&result), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_negative_rank_precedes_neutral() {
        let prefer = filter_fn("prefer", |c, _| {
            if c.id == "pref" {
                Verdict::ranked(-1)
            } else {
                Verdict::keep()
            }
        });
        let result = apply(prefer.as_ref(), candidates(&["x", "pref"]), &FilterExtensions::new());
        assert_eq!(ids(&result), vec!["pref", "x"]);

        let demote = filter_fn("demote", |c, _| {
            if c.id == "x" {
                Verdict::ranked(1)
            } else {
                Verdict::keep()
            }
        });
        let result = apply(demote.as_ref(), candidates(&["x", "y"]), &FilterExtensions::new());
        assert_eq!(ids(&result), vec!["y", "x"]);
    }

    #[test]
    fn test_conjunction_keeps_slots_aligned_with_neutral_verdicts() {
        let primary = filter_fn("primary", |c, _| {
            if c.id == "pref" {
                Verdict::ranked(0)
            } else {
                Verdict::keep()
            }
        });
        let combined = combine(Some(primary), Arc::new(WeightOrder::new()));

        let list = vec![
            Implementation::remote("c", "x").with_weight(300),
            Implementation::remote("c", "pref").with_weight(10),
        ];
        let result = apply(combined.as_ref(), list, &FilterExtensions::new());

        // Both tie on the primary slot, so weight decides
        assert_eq!(ids(&result), vec!["x", "pref"]);
        let ext = FilterExtensions::new();
        let x = combined.evaluate(&Implementation::remote("c", "x").with_weight(300), &ext);
        let pref = combined.evaluate(&Implementation::remote("c", "pref").with_weight(10), &ext);
        assert_eq!(x.rank.keys(), &[0, -300]);
        assert_eq!(pref.rank.keys(), &[0, -10]);
    }

    #[test]
    fn test_conjunction_primary_rank_wins_over_secondary() {
        let primary = filter_fn("primary", |c, _| {
            if c.id == "pref" {
                Verdict::ranked(-1)
            } else {
                Verdict::keep()
            }
        });
        let combined = combine(Some(primary), Arc::new(WeightOrder::new()));

        let list = vec![
            Implementation::remote("c", "x").with_weight(300),
            Implementation::remote("c", "pref").with_weight(10),
        ];
        let result = apply(combined.as_ref(), list, &FilterExtensions::new());
        assert_eq!(ids(&result), vec!["pref", "x"]);
    }

    #[test]
    fn test_combine_without_existing_returns_next() {
        let only = filter_fn("only", |_, _| Verdict::drop());
        let combined = combine(None, only.clone());
        assert!(Arc::ptr_eq(&only, &combined));
    }
}
