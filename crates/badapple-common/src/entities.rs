//! Records read and written by the annotation engine.
//!
//! Identifiers are PubChem-style integers. Counters are stored as `i64`
//! so they map directly onto BIGINT columns.

use serde::{Deserialize, Serialize};

/// Compound identifier.
pub type Cid = i64;
/// Substance identifier.
pub type Sid = i64;
/// Assay identifier.
pub type Aid = i64;
/// Scaffold identifier.
pub type ScafId = i64;

/// One raw outcome record: a substance tested in an assay.
///
/// Outcome codes: 1 inactive, 2 active, 3 inconclusive, 4 unspecified, 5 probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityResult {
    pub sid: Sid,
    pub aid: Aid,
    pub outcome: i16,
}

/// A substance of one compound, left-joined against its outcomes.
/// `aid`/`outcome` are `None` for a substance with no outcome rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubstanceOutcome {
    pub sid: Sid,
    pub aid: Option<Aid>,
    pub outcome: Option<i16>,
}

/// An outcome row reached through a compound (compound → substance → activity).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompoundOutcome {
    pub cid: Cid,
    pub sid: Sid,
    pub aid: Aid,
    pub outcome: i16,
}

/// Derived activity counters stored on a compound row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundCounts {
    pub nsub_total: i64,
    pub nsub_tested: i64,
    pub nsub_active: i64,
    pub nass_tested: i64,
    pub nass_active: i64,
    pub nsam_tested: i64,
    pub nsam_active: i64,
}

/// A compound with its previously computed counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompoundRow {
    pub cid: Cid,
    pub counts: CompoundCounts,
}

/// Derived activity counters stored on a scaffold row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaffoldCounts {
    pub ncpd_total: i64,
    pub ncpd_tested: i64,
    pub ncpd_active: i64,
    pub nsub_total: i64,
    pub nsub_tested: i64,
    pub nsub_active: i64,
    pub nass_tested: i64,
    pub nass_active: i64,
    pub nsam_tested: i64,
    pub nsam_active: i64,
}

/// A scaffold row as read back for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaffoldRow {
    pub id: ScafId,
    pub counts: ScaffoldCounts,
    pub pscore: Option<f64>,
}

/// Population medians over the scaffold table, used as score baselines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Medians {
    pub median_ncpd_tested: f64,
    pub median_nsub_tested: f64,
    pub median_nass_tested: f64,
    pub median_nsam_tested: f64,
}
