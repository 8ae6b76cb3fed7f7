//! Compound-level rollup.
//!
//! A compound's counters are recomputed from its substances' raw outcome
//! rows every time; stored values are overwritten, never incremented.

use crate::error::{AnnotateError, Result};
use crate::options::AssayFilter;
use crate::outcome::{classify, AssayTally, SubstanceTally};
use badapple_common::{Cid, CompoundCounts, Sid, SubstanceOutcome};
use badapple_db::ActivityStore;
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Result of annotating one compound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompoundAnnotation {
    pub counts: CompoundCounts,
    /// Outcome rows read for the compound, before the assay filter.
    pub n_results: usize,
    /// 1 if the row was written.
    pub written: usize,
    /// 1 if the write failed.
    pub errors: usize,
}

/// Roll up one compound's substance/outcome rows.
///
/// Rows with no assay (a substance with no outcomes) still register the
/// substance. Rows for assays the filter rejects are dropped before
/// classification.
pub fn compound_counts(rows: &[SubstanceOutcome], filter: &AssayFilter) -> CompoundCounts {
    let mut substances: BTreeMap<Sid, SubstanceTally> = BTreeMap::new();
    let mut assays = AssayTally::new();
    let mut counts = CompoundCounts::default();

    for row in rows {
        let tally = substances.entry(row.sid).or_default();
        let Some(aid) = row.aid else { continue };
        if !filter.allows(aid) {
            continue;
        }
        let class = classify(row.outcome);
        tally.record(class);
        assays.record(aid, class);
        if class.is_tested() {
            counts.nsam_tested += 1;
        }
        if class.is_active() {
            counts.nsam_active += 1;
        }
    }

    counts.nsub_total = substances.len() as i64;
    counts.nsub_tested = substances.values().filter(|s| s.tested).count() as i64;
    counts.nsub_active = substances.values().filter(|s| s.active).count() as i64;
    counts.nass_tested = assays.n_tested();
    counts.nass_active = assays.n_active();
    counts
}

/// Recompute and (unless `no_write`) persist the counters of one compound.
///
/// A failed read is returned as an error. A failed non-fatal write is logged
/// and reported through [`CompoundAnnotation::errors`]; a fatal one is returned.
pub async fn annotate_compound<S>(
    store: &S,
    cid: Cid,
    filter: &AssayFilter,
    no_write: bool,
) -> Result<CompoundAnnotation>
where
    S: ActivityStore + ?Sized,
{
    let rows = store
        .compound_outcomes(cid)
        .await
        .map_err(|source| AnnotateError::Entity { entity: "compound", id: cid, source })?;

    let counts = compound_counts(&rows, filter);
    let n_results = rows.iter().filter(|r| r.aid.is_some()).count();

    debug!(
        cid,
        nsub_total = counts.nsub_total,
        nsub_tested = counts.nsub_tested,
        nsub_active = counts.nsub_active,
        nass_tested = counts.nass_tested,
        nass_active = counts.nass_active,
        nsam_tested = counts.nsam_tested,
        nsam_active = counts.nsam_active,
        "Compound counts"
    );

    let mut annotation = CompoundAnnotation { counts, n_results, ..Default::default() };
    if no_write {
        return Ok(annotation);
    }

    match store.update_compound(cid, &counts).await {
        Ok(()) => annotation.written = 1,
        Err(e) if e.is_fatal() => {
            return Err(AnnotateError::Entity { entity: "compound", id: cid, source: e })
        }
        Err(e) => {
            error!(cid, error = %e, "Compound update failed");
            annotation.errors = 1;
        }
    }
    Ok(annotation)
}
