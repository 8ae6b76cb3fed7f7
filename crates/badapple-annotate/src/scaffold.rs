//! Scaffold-level rollup.
//!
//! Substance and sample counters are partitioned by compound, so they are
//! summed over the scaffold's compounds. Assays are shared between
//! compounds and are de-duplicated in a separate pass over the raw rows.

use crate::error::{AnnotateError, Result};
use crate::options::{AssayFilter, ScaffoldOptions};
use crate::outcome::{classify, AssayTally};
use badapple_common::{Aid, Cid, CompoundOutcome, CompoundRow, ScafId, ScaffoldCounts};
use badapple_db::{ActivityStore, DbError};
use std::collections::HashSet;
use tracing::{debug, error};

/// Result of annotating one scaffold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScaffoldAnnotation {
    pub counts: ScaffoldCounts,
    /// Compounds linked to the scaffold, before the confidence filter.
    pub n_compounds: usize,
    /// Outcome rows read for the assay pass.
    pub n_results: usize,
    /// Assays active for the scaffold, ascending. Empty unless provenance
    /// was requested.
    pub active_assays: Vec<Aid>,
    /// Provenance rows inserted.
    pub n_provenance: u64,
    /// 1 if the counters were written.
    pub written: usize,
    /// Non-fatal write failures (counters and provenance).
    pub errors: usize,
}

fn entity_error(scaf_id: ScafId, source: DbError) -> AnnotateError {
    AnnotateError::Entity { entity: "scaffold", id: scaf_id, source }
}

/// Counters that come straight from the compound rows: `ncpd_*` over every
/// linked compound, substance and sample sums over the admitted ones.
fn rollup(compounds: &[CompoundRow], admitted: &HashSet<Cid>) -> ScaffoldCounts {
    let mut counts = ScaffoldCounts {
        ncpd_total: compounds.len() as i64,
        ..Default::default()
    };
    for c in compounds {
        if c.counts.nass_tested > 0 {
            counts.ncpd_tested += 1;
        }
        if c.counts.nass_active > 0 {
            counts.ncpd_active += 1;
        }
        if !admitted.contains(&c.cid) {
            continue;
        }
        counts.nsub_total += c.counts.nsub_total;
        counts.nsub_tested += c.counts.nsub_tested;
        counts.nsub_active += c.counts.nsub_active;
        counts.nsam_tested += c.counts.nsam_tested;
        counts.nsam_active += c.counts.nsam_active;
    }
    counts
}

fn tally<'a>(
    rows: impl Iterator<Item = &'a CompoundOutcome>,
    filter: &AssayFilter,
) -> AssayTally {
    let mut assays = AssayTally::new();
    for r in rows.filter(|r| filter.allows(r.aid)) {
        assays.record(r.aid, classify(Some(r.outcome)));
    }
    assays
}

/// Recompute and (unless `no_write`) persist the counters of one scaffold.
///
/// Expects the compound counters of every linked compound to be current.
pub async fn annotate_scaffold<S>(
    store: &S,
    scaf_id: ScafId,
    filter: &AssayFilter,
    opts: &ScaffoldOptions,
) -> Result<ScaffoldAnnotation>
where
    S: ActivityStore + ?Sized,
{
    let compounds = store
        .scaffold_compounds(scaf_id)
        .await
        .map_err(|e| entity_error(scaf_id, e))?;

    let min = opts.threshold();
    let all: Vec<Cid> = compounds.iter().map(|c| c.cid).collect();
    let admitted: HashSet<Cid> = compounds
        .iter()
        .filter(|c| c.counts.nass_tested >= min)
        .map(|c| c.cid)
        .collect();

    let mut counts = rollup(&compounds, &admitted);

    // Provenance is drawn from every linked compound once a real threshold is set.
    let provenance_unfiltered = opts.write_active_assays && min > 1;
    let to_read: Vec<Cid> = if provenance_unfiltered {
        all
    } else {
        all.into_iter().filter(|cid| admitted.contains(cid)).collect()
    };
    let rows = if to_read.is_empty() {
        Vec::new()
    } else {
        store
            .outcomes_for_compounds(&to_read)
            .await
            .map_err(|e| entity_error(scaf_id, e))?
    };

    let n_results = rows.iter().filter(|r| admitted.contains(&r.cid)).count();
    let assays = tally(rows.iter().filter(|r| admitted.contains(&r.cid)), filter);
    counts.nass_tested = assays.n_tested();
    counts.nass_active = assays.n_active();

    let active_assays = if !opts.write_active_assays {
        Vec::new()
    } else if provenance_unfiltered {
        tally(rows.iter(), filter).active_assays()
    } else {
        assays.active_assays()
    };

    debug!(
        scaf_id,
        ncpd_total = counts.ncpd_total,
        ncpd_admitted = admitted.len(),
        nsub_total = counts.nsub_total,
        nass_tested = counts.nass_tested,
        nass_active = counts.nass_active,
        nsam_tested = counts.nsam_tested,
        nsam_active = counts.nsam_active,
        "Scaffold counts"
    );

    let mut annotation = ScaffoldAnnotation {
        counts,
        n_compounds: compounds.len(),
        n_results,
        active_assays,
        ..Default::default()
    };
    if opts.no_write {
        return Ok(annotation);
    }

    match store.update_scaffold(&opts.table, scaf_id, &counts).await {
        Ok(()) => annotation.written = 1,
        Err(e) if e.is_fatal() => return Err(entity_error(scaf_id, e)),
        Err(e) => {
            error!(scaf_id, table = %opts.table, error = %e, "Scaffold update failed");
            annotation.errors += 1;
            return Ok(annotation);
        }
    }

    if opts.write_active_assays && !annotation.active_assays.is_empty() {
        match store.insert_active_assays(scaf_id, &annotation.active_assays).await {
            Ok(n) => annotation.n_provenance = n,
            Err(e) if e.is_fatal() => return Err(entity_error(scaf_id, e)),
            Err(e) => {
                error!(scaf_id, error = %e, "Active assay insert failed");
                annotation.errors += 1;
            }
        }
    }
    Ok(annotation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compound::annotate_compound;
    use badapple_db::{ActivityReader, Identifier, MemoryStore};
    use pretty_assertions::assert_eq;

    /// Seed raw rows, run the compound pass for every compound, link all of
    /// them to scaffold 1.
    async fn seeded(results: &[(Cid, i64, i64, i16)]) -> MemoryStore {
        let store = MemoryStore::new();
        store.add_scaffold("scaffold", 1);
        for &(cid, sid, aid, outcome) in results {
            store.add_substance(sid, cid);
            store.add_result(sid, aid, outcome);
            store.link(1, cid);
        }
        for cid in store.compound_ids().await.unwrap() {
            annotate_compound(&store, cid, &AssayFilter::all(), false).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_shared_assay_counted_once_as_active() {
        // compound 100 active in assay 7, compound 200 merely tested in it
        let store = seeded(&[(100, 1, 7, 2), (200, 2, 7, 1)]).await;
        let a = annotate_scaffold(&store, 1, &AssayFilter::all(), &ScaffoldOptions::default())
            .await
            .unwrap();
        assert_eq!(a.counts.nass_tested, 1);
        assert_eq!(a.counts.nass_active, 1);
        assert_eq!(a.counts.ncpd_total, 2);
        assert_eq!(a.counts.ncpd_tested, 2);
        assert_eq!(a.counts.ncpd_active, 1);
        assert_eq!(store.scaffold_default(1).unwrap().counts, a.counts);
    }

    #[tokio::test]
    async fn test_substance_counts_are_summed() {
        let store = seeded(&[(100, 1, 7, 2), (100, 2, 8, 1), (200, 3, 7, 1)]).await;
        let a = annotate_scaffold(&store, 1, &AssayFilter::all(), &ScaffoldOptions::default())
            .await
            .unwrap();
        let sum: i64 = [100, 200].iter().map(|&c| store.compound(c).unwrap().nsub_total).sum();
        assert_eq!(a.counts.nsub_total, sum);
        assert_eq!(a.counts.nsam_tested, 3);
        assert_eq!(a.counts.nsam_active, 1);
        assert_eq!(a.counts.nass_tested, 2);
    }

    #[tokio::test]
    async fn test_threshold_shrinks_rollup_not_ncpd() {
        // compound 100 tested in two assays, compound 200 in one
        let store = seeded(&[(100, 1, 7, 2), (100, 2, 8, 1), (200, 3, 9, 2)]).await;
        let mut opts = ScaffoldOptions::default();
        let loose = annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();

        opts.nass_tested_min = Some(2);
        opts.no_write = true;
        let strict = annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();

        assert_eq!(loose.counts.ncpd_total, strict.counts.ncpd_total);
        assert_eq!(loose.counts.ncpd_active, strict.counts.ncpd_active);
        assert!(strict.counts.nsub_total <= loose.counts.nsub_total);
        assert_eq!(strict.counts.nsub_total, 2);
        assert_eq!(strict.counts.nass_tested, 2);
        assert_eq!(strict.counts.nass_active, 1);
        assert_eq!(loose.counts.nass_active, 2);
    }

    #[tokio::test]
    async fn test_assay_filter_applies_to_dedup_pass() {
        let store = seeded(&[(100, 1, 7, 2), (200, 2, 8, 2)]).await;
        let a = annotate_scaffold(&store, 1, &AssayFilter::only([8]), &ScaffoldOptions::default())
            .await
            .unwrap();
        assert_eq!(a.counts.nass_tested, 1);
        assert_eq!(a.counts.nass_active, 1);
    }

    #[tokio::test]
    async fn test_scaffold_without_compounds_is_all_zero() {
        let store = MemoryStore::new();
        store.add_scaffold("scaffold", 5);
        let a = annotate_scaffold(&store, 5, &AssayFilter::all(), &ScaffoldOptions::default())
            .await
            .unwrap();
        assert_eq!(a.counts, ScaffoldCounts::default());
        assert_eq!(a.written, 1);
    }

    #[tokio::test]
    async fn test_provenance_uses_unfiltered_set_under_threshold() {
        // compound 200 is below the threshold but is the only one active in assay 9
        let store = seeded(&[(100, 1, 7, 2), (100, 2, 8, 1), (200, 3, 9, 2)]).await;
        let opts = ScaffoldOptions {
            nass_tested_min: Some(2),
            write_active_assays: true,
            ..Default::default()
        };
        let a = annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();

        assert_eq!(a.counts.nass_active, 1);
        assert_eq!(a.active_assays, vec![7, 9]);
        assert_eq!(a.n_provenance, 2);
        assert_eq!(store.active_assay_rows(), vec![(1, 7), (1, 9)]);
    }

    #[tokio::test]
    async fn test_result_count_ignores_provenance_only_rows() {
        let store = seeded(&[(100, 1, 7, 2), (100, 2, 8, 1), (200, 3, 9, 2)]).await;
        let opts = ScaffoldOptions {
            nass_tested_min: Some(2),
            write_active_assays: true,
            ..Default::default()
        };
        let a = annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();
        assert_eq!(a.n_results, 2);
        assert_eq!(a.active_assays, vec![7, 9]);
    }

    #[tokio::test]
    async fn test_provenance_rerun_adds_nothing() {
        let store = seeded(&[(100, 1, 7, 2)]).await;
        let opts = ScaffoldOptions { write_active_assays: true, ..Default::default() };
        annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();
        let again = annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();
        assert_eq!(again.n_provenance, 0);
        assert_eq!(store.active_assay_rows(), vec![(1, 7)]);
    }

    #[tokio::test]
    async fn test_alternative_table() {
        let store = seeded(&[(100, 1, 7, 2)]).await;
        store.add_scaffold("scaffold_min2", 1);
        let opts = ScaffoldOptions::new(Identifier::new("scaffold_min2").unwrap());
        annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();

        assert_eq!(store.scaffold("scaffold_min2", 1).unwrap().counts.nass_active, 1);
        assert_eq!(store.scaffold_default(1).unwrap().counts, ScaffoldCounts::default());
    }

    #[tokio::test]
    async fn test_failed_write_skips_provenance() {
        let store = seeded(&[(100, 1, 7, 2)]).await;
        store.fail_writes_for_scaffold(1);
        let opts = ScaffoldOptions { write_active_assays: true, ..Default::default() };
        let a = annotate_scaffold(&store, 1, &AssayFilter::all(), &opts).await.unwrap();
        assert_eq!(a.errors, 1);
        assert_eq!(a.written, 0);
        assert!(store.active_assay_rows().is_empty());
    }
}
