//! Compound risk filter built on scaffold scores.
//!
//! A compound is flagged when any of its scaffolds scores at or above
//! `pscore_max`, unless that scaffold also occurs in an approved drug.

use serde::{Deserialize, Serialize};

/// What the database knows about one scaffold of a query compound.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaffoldHit {
    pub pscore: Option<f64>,
    pub in_drug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub pscore_max: f64,
    pub ignore_in_drug: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self { pscore_max: 300.0, ignore_in_drug: false }
    }
}

/// Does one scaffold pass? `None` means the scaffold is not in the database.
pub fn passes_filter(hit: Option<&ScaffoldHit>, opts: &FilterOptions) -> bool {
    let Some(hit) = hit else { return true };
    let Some(pscore) = hit.pscore else { return true };
    if pscore < opts.pscore_max {
        return true;
    }
    !opts.ignore_in_drug && hit.in_drug
}

/// A compound passes iff every scaffold passes. No scaffolds, no risk.
pub fn compound_passes(hits: &[Option<ScaffoldHit>], opts: &FilterOptions) -> bool {
    hits.iter().all(|h| passes_filter(h.as_ref(), opts))
}
