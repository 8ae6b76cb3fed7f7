//! Whole-table passes.
//!
//! Entities are visited one at a time in ascending id order. A per-entity
//! failure is logged and counted; only a fatal store error ends the pass.
//! Nothing spans entities, so an interrupted pass can be resumed with
//! `n_skip`.

use crate::compound::annotate_compound;
use crate::error::Result;
use crate::options::{AssayFilter, BatchBounds, ScaffoldOptions};
use crate::scaffold::annotate_scaffold;
use badapple_db::ActivityStore;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info};

/// Proof that the compound pass has completed. The scaffold pass reads
/// compound counters and will not start without it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompoundsAnnotated {
    _private: (),
}

impl CompoundsAnnotated {
    /// For runs that annotate scaffolds only, the compound counters having
    /// been written by an earlier run against the same data.
    pub fn from_previous_run() -> Self {
        Self { _private: () }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompoundPassSummary {
    pub n_compounds: usize,
    pub n_substances: usize,
    pub n_results: usize,
    pub n_written: usize,
    pub n_errors: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScaffoldPassSummary {
    pub n_scaffolds: usize,
    pub n_compounds: usize,
    pub n_substances: usize,
    pub n_results: usize,
    pub n_written: usize,
    pub n_provenance: u64,
    pub n_errors: usize,
}

struct Progress {
    label: &'static str,
    every: usize,
    total: usize,
    started: Instant,
}

impl Progress {
    fn new(label: &'static str, every: usize, total: usize) -> Self {
        Self { label, every, total, started: Instant::now() }
    }

    fn tick(&self, done: usize, errors: usize) {
        if self.every == 0 || done == 0 || done % self.every != 0 {
            return;
        }
        let pct = if self.total == 0 { 100.0 } else { 100.0 * done as f64 / self.total as f64 };
        info!(
            pass = self.label,
            done,
            total = self.total,
            errors,
            elapsed_s = self.started.elapsed().as_secs(),
            "Progress {:.1}%",
            pct
        );
    }
}

/// Annotate every compound within `bounds`.
pub async fn annotate_compounds<S>(
    store: &S,
    filter: &AssayFilter,
    no_write: bool,
    bounds: &BatchBounds,
) -> Result<(CompoundPassSummary, CompoundsAnnotated)>
where
    S: ActivityStore + ?Sized,
{
    let ids = store.compound_ids().await?;
    let (start, end) = bounds.window(ids.len());
    info!(
        total = ids.len(),
        n_skip = start,
        n_todo = end - start,
        assay_filter = ?filter.allowed_count(),
        no_write,
        "Annotating compounds"
    );

    let progress = Progress::new("compounds", bounds.progress_every, end - start);
    let mut summary = CompoundPassSummary::default();

    for &cid in &ids[start..end] {
        match annotate_compound(store, cid, filter, no_write).await {
            Ok(a) => {
                summary.n_substances += a.counts.nsub_total as usize;
                summary.n_results += a.n_results;
                summary.n_written += a.written;
                summary.n_errors += a.errors;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(cid, error = %e, "Compound skipped");
                summary.n_errors += 1;
            }
        }
        summary.n_compounds += 1;
        progress.tick(summary.n_compounds, summary.n_errors);
    }

    info!(
        n_compounds = summary.n_compounds,
        n_substances = summary.n_substances,
        n_results = summary.n_results,
        n_written = summary.n_written,
        n_errors = summary.n_errors,
        elapsed_s = progress.started.elapsed().as_secs(),
        "Compound pass complete"
    );
    Ok((summary, CompoundsAnnotated { _private: () }))
}

/// Annotate every scaffold of `opts.table` within `bounds`.
pub async fn annotate_scaffolds<S>(
    store: &S,
    _compounds_done: &CompoundsAnnotated,
    filter: &AssayFilter,
    opts: &ScaffoldOptions,
    bounds: &BatchBounds,
) -> Result<ScaffoldPassSummary>
where
    S: ActivityStore + ?Sized,
{
    let ids = store.scaffold_ids(&opts.table).await?;
    let (start, end) = bounds.window(ids.len());
    info!(
        table = %opts.table,
        total = ids.len(),
        n_skip = start,
        n_todo = end - start,
        nass_tested_min = ?opts.nass_tested_min,
        assay_filter = ?filter.allowed_count(),
        write_active_assays = opts.write_active_assays,
        no_write = opts.no_write,
        "Annotating scaffolds"
    );

    let progress = Progress::new("scaffolds", bounds.progress_every, end - start);
    let mut summary = ScaffoldPassSummary::default();

    for &scaf_id in &ids[start..end] {
        match annotate_scaffold(store, scaf_id, filter, opts).await {
            Ok(a) => {
                summary.n_compounds += a.n_compounds;
                summary.n_substances += a.counts.nsub_total as usize;
                summary.n_results += a.n_results;
                summary.n_written += a.written;
                summary.n_provenance += a.n_provenance;
                summary.n_errors += a.errors;
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!(scaf_id, error = %e, "Scaffold skipped");
                summary.n_errors += 1;
            }
        }
        summary.n_scaffolds += 1;
        progress.tick(summary.n_scaffolds, summary.n_errors);
    }

    info!(
        table = %opts.table,
        n_scaffolds = summary.n_scaffolds,
        n_compounds = summary.n_compounds,
        n_substances = summary.n_substances,
        n_results = summary.n_results,
        n_written = summary.n_written,
        n_provenance = summary.n_provenance,
        n_errors = summary.n_errors,
        elapsed_s = progress.started.elapsed().as_secs(),
        "Scaffold pass complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use badapple_db::MemoryStore;

    fn store_with_compounds(n: i64) -> MemoryStore {
        let store = MemoryStore::new();
        for cid in 1..=n {
            store.add_substance(cid * 10, cid);
            store.add_result(cid * 10, 1, 2);
        }
        store
    }

    #[tokio::test]
    async fn test_skip_and_max_select_ascending_window() {
        let store = store_with_compounds(5);
        let bounds = BatchBounds { n_skip: 1, n_max: 2, progress_every: 1 };
        let (summary, _) = annotate_compounds(&store, &AssayFilter::all(), false, &bounds)
            .await
            .unwrap();

        assert_eq!(summary.n_compounds, 2);
        assert_eq!(summary.n_written, 2);
        assert_eq!(store.compound(1).unwrap().nass_active, 0);
        assert_eq!(store.compound(2).unwrap().nass_active, 1);
        assert_eq!(store.compound(3).unwrap().nass_active, 1);
        assert_eq!(store.compound(4).unwrap().nass_active, 0);
    }

    #[tokio::test]
    async fn test_skip_past_end_is_empty() {
        let store = store_with_compounds(2);
        let bounds = BatchBounds { n_skip: 10, ..Default::default() };
        let (summary, _) = annotate_compounds(&store, &AssayFilter::all(), false, &bounds)
            .await
            .unwrap();
        assert_eq!(summary, CompoundPassSummary::default());
    }

    #[tokio::test]
    async fn test_one_failing_row_does_not_stop_the_pass() {
        let store = store_with_compounds(3);
        store.fail_writes_for_compound(2);
        let (summary, _) =
            annotate_compounds(&store, &AssayFilter::all(), false, &BatchBounds::default())
                .await
                .unwrap();

        assert_eq!(summary.n_compounds, 3);
        assert_eq!(summary.n_written, 2);
        assert_eq!(summary.n_errors, 1);
        assert_eq!(summary.n_substances, 3);
        assert_eq!(summary.n_results, 3);
        assert_eq!(store.compound(3).unwrap().nass_active, 1);
    }

    #[tokio::test]
    async fn test_lost_connection_aborts() {
        let store = store_with_compounds(3);
        store.disconnect();
        let err = annotate_compounds(&store, &AssayFilter::all(), false, &BatchBounds::default())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_scaffold_pass_counts_errors() {
        let store = store_with_compounds(2);
        for scaf_id in [1, 2] {
            store.add_scaffold("scaffold", scaf_id);
            store.link(scaf_id, scaf_id);
        }
        store.fail_writes_for_scaffold(1);

        let (_, done) =
            annotate_compounds(&store, &AssayFilter::all(), false, &BatchBounds::default())
                .await
                .unwrap();
        let summary = annotate_scaffolds(
            &store,
            &done,
            &AssayFilter::all(),
            &ScaffoldOptions::default(),
            &BatchBounds::default(),
        )
        .await
        .unwrap();

        assert_eq!(summary.n_scaffolds, 2);
        assert_eq!(summary.n_compounds, 2);
        assert_eq!(summary.n_written, 1);
        assert_eq!(summary.n_errors, 1);
        assert_eq!(store.scaffold_default(2).unwrap().counts.nass_active, 1);
    }

    #[tokio::test]
    async fn test_missing_scaffold_table_is_reported() {
        let store = store_with_compounds(1);
        let err = annotate_scaffolds(
            &store,
            &CompoundsAnnotated::from_previous_run(),
            &AssayFilter::all(),
            &ScaffoldOptions::default(),
            &BatchBounds::default(),
        )
        .await
        .unwrap_err();
        assert!(!err.is_fatal());
    }
}
