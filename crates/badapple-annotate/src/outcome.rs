//! Outcome classification and the small tallies built from it.
//!
//! MLP outcome codes:
//!
//! | code | meaning      | class   |
//! |------|--------------|---------|
//! | 1    | inactive     | tested  |
//! | 2    | active       | active  |
//! | 3    | inconclusive | tested  |
//! | 4    | unspecified  | neither |
//! | 5    | probe        | active  |

use badapple_common::Aid;
use std::collections::BTreeMap;

/// What one outcome record says about its substance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Tested, not active.
    Tested,
    /// Active; implies tested.
    Active,
    /// Not evidence of testing (unspecified, unknown code, or no record).
    Neither,
}

impl Classification {
    pub fn is_tested(self) -> bool {
        matches!(self, Classification::Tested | Classification::Active)
    }

    pub fn is_active(self) -> bool {
        self == Classification::Active
    }
}

/// Classify an outcome code. `None` (no outcome row) is never tested.
pub fn classify(outcome: Option<i16>) -> Classification {
    match outcome {
        Some(2) | Some(5) => Classification::Active,
        Some(1) | Some(3) => Classification::Tested,
        _ => Classification::Neither,
    }
}

/// Per-substance accumulation during a compound scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstanceTally {
    pub tested: bool,
    pub active: bool,
}

impl SubstanceTally {
    pub fn record(&mut self, class: Classification) {
        self.tested |= class.is_tested();
        self.active |= class.is_active();
    }
}

/// Distinct assays seen across a set of outcome rows. An assay is active if
/// any contributing row is active, otherwise tested.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssayTally {
    assays: BTreeMap<Aid, bool>,
}

impl AssayTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one row. Rows that are neither tested nor active are ignored.
    pub fn record(&mut self, aid: Aid, class: Classification) {
        if !class.is_tested() {
            return;
        }
        let active = self.assays.entry(aid).or_insert(false);
        *active |= class.is_active();
    }

    pub fn n_tested(&self) -> i64 {
        self.assays.len() as i64
    }

    pub fn n_active(&self) -> i64 {
        self.assays.values().filter(|&&active| active).count() as i64
    }

    /// Active assay ids, ascending.
    pub fn active_assays(&self) -> Vec<Aid> {
        self.assays
            .iter()
            .filter(|(_, &active)| active)
            .map(|(&aid, _)| aid)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_codes() {
        assert_eq!(classify(Some(1)), Classification::Tested);
        assert_eq!(classify(Some(2)), Classification::Active);
        assert_eq!(classify(Some(3)), Classification::Tested);
        assert_eq!(classify(Some(4)), Classification::Neither);
        assert_eq!(classify(Some(5)), Classification::Active);
        assert_eq!(classify(None), Classification::Neither);
    }

    #[test]
    fn test_unknown_codes_are_neither() {
        for code in [0, 6, -1, i16::MAX] {
            assert_eq!(classify(Some(code)), Classification::Neither);
        }
    }

    #[test]
    fn test_active_implies_tested() {
        assert!(Classification::Active.is_tested());
        assert!(!Classification::Tested.is_active());
        assert!(!Classification::Neither.is_tested());
    }

    #[test]
    fn test_assay_active_wins_regardless_of_order() {
        let mut forward = AssayTally::new();
        forward.record(7, Classification::Active);
        forward.record(7, Classification::Tested);

        let mut backward = AssayTally::new();
        backward.record(7, Classification::Tested);
        backward.record(7, Classification::Active);

        for tally in [forward, backward] {
            assert_eq!(tally.n_tested(), 1);
            assert_eq!(tally.n_active(), 1);
            assert_eq!(tally.active_assays(), vec![7]);
        }
    }

    #[test]
    fn test_unspecified_rows_do_not_add_assays() {
        let mut tally = AssayTally::new();
        tally.record(2, Classification::Neither);
        tally.record(1, Classification::Tested);
        assert_eq!(tally.n_tested(), 1);
        assert_eq!(tally.n_active(), 0);
        assert!(tally.active_assays().is_empty());
    }

    #[test]
    fn test_substance_tally_is_sticky() {
        let mut s = SubstanceTally::default();
        s.record(Classification::Active);
        s.record(Classification::Tested);
        s.record(Classification::Neither);
        assert_eq!(s, SubstanceTally { tested: true, active: true });
    }
}
