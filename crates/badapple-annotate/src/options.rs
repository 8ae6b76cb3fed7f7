//! Caller-supplied knobs for the aggregators and the batch driver.

use badapple_common::Aid;
use badapple_db::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Optional assay allow-list. Rows for assays outside the list are treated
/// as if they did not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssayFilter {
    allowed: Option<BTreeSet<Aid>>,
}

impl AssayFilter {
    /// Admit every assay.
    pub fn all() -> Self {
        Self { allowed: None }
    }

    /// Admit only the listed assays. An empty list admits nothing.
    pub fn only(aids: impl IntoIterator<Item = Aid>) -> Self {
        Self {
            allowed: Some(aids.into_iter().collect()),
        }
    }

    pub fn allows(&self, aid: Aid) -> bool {
        match &self.allowed {
            Some(set) => set.contains(&aid),
            None => true,
        }
    }

    pub fn is_restricted(&self) -> bool {
        self.allowed.is_some()
    }

    /// Number of allowed assays, `None` when unrestricted.
    pub fn allowed_count(&self) -> Option<usize> {
        self.allowed.as_ref().map(BTreeSet::len)
    }
}

impl From<BTreeSet<Aid>> for AssayFilter {
    fn from(aids: BTreeSet<Aid>) -> Self {
        Self { allowed: Some(aids) }
    }
}

/// Iteration bounds for one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchBounds {
    /// Entities to skip (in ascending id order) before processing.
    pub n_skip: usize,
    /// Process at most this many entities; 0 means no limit.
    pub n_max: usize,
    /// Log progress every this many entities; 0 disables progress lines.
    pub progress_every: usize,
}

impl Default for BatchBounds {
    fn default() -> Self {
        Self {
            n_skip: 0,
            n_max: 0,
            progress_every: 1000,
        }
    }
}

impl BatchBounds {
    /// The slice of `total` entities this pass should visit, as `(start, end)`.
    pub fn window(&self, total: usize) -> (usize, usize) {
        let start = self.n_skip.min(total);
        let end = if self.n_max == 0 {
            total
        } else {
            start.saturating_add(self.n_max).min(total)
        };
        (start, end)
    }
}

/// Scaffold pass configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScaffoldOptions {
    /// Table receiving the scaffold counters.
    pub table: Identifier,
    /// Minimum compound `nass_tested` for inclusion in the rollups.
    pub nass_tested_min: Option<i64>,
    /// Record `(scaf_id, aid)` rows for active assays.
    pub write_active_assays: bool,
    /// Compute without writing.
    pub no_write: bool,
}

impl ScaffoldOptions {
    pub fn new(table: Identifier) -> Self {
        Self {
            table,
            nass_tested_min: None,
            write_active_assays: false,
            no_write: false,
        }
    }

    /// Threshold in effect; an absent threshold admits every compound.
    pub fn threshold(&self) -> i64 {
        self.nass_tested_min.unwrap_or(0)
    }
}

impl Default for ScaffoldOptions {
    fn default() -> Self {
        Self::new(Identifier::default_scaffold_table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrestricted_filter_allows_everything() {
        let f = AssayFilter::all();
        assert!(f.allows(1));
        assert!(f.allows(i64::MAX));
        assert!(!f.is_restricted());
        assert_eq!(f.allowed_count(), None);
    }

    #[test]
    fn test_restricted_filter() {
        let f = AssayFilter::only([3, 1, 3]);
        assert!(f.allows(1));
        assert!(!f.allows(2));
        assert_eq!(f.allowed_count(), Some(2));
        assert!(!AssayFilter::only([]).allows(1));
    }

    #[test]
    fn test_window_skip_and_max() {
        let b = BatchBounds { n_skip: 2, n_max: 3, progress_every: 0 };
        assert_eq!(b.window(10), (2, 5));
        assert_eq!(b.window(4), (2, 4));
        assert_eq!(b.window(1), (1, 1));
    }

    #[test]
    fn test_window_unlimited() {
        let b = BatchBounds::default();
        assert_eq!(b.window(7), (0, 7));
        assert_eq!(b.window(0), (0, 0));
    }

    #[test]
    fn test_default_scaffold_options() {
        let o = ScaffoldOptions::default();
        assert_eq!(o.table.as_str(), "scaffold");
        assert_eq!(o.threshold(), 0);
        assert!(!o.no_write && !o.write_active_assays);
    }
}
