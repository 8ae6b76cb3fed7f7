//! Score pass over a scaffold table.
//!
//! All scores are computed first and written in one batch at the end.

use crate::error::{Result, ScoreError};
use crate::scorer::score_counts;
use badapple_common::ScafId;
use badapple_db::{ActivityStore, Identifier};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info};

/// Inclusive id range to score. Missing bounds default to the table's
/// smallest and largest id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min_id: Option<ScafId>,
    pub max_id: Option<ScafId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    /// Scaffolds scored.
    pub n_scaf: usize,
    /// Scores that came out null (no evidence).
    pub n_null: usize,
    pub n_zero: usize,
    pub n_gtzero: usize,
    /// Rows updated by the batched write.
    pub n_update: u64,
}

/// Score every scaffold of `table` within `range` and write the scores in
/// one batch (skipped when `no_write`).
///
/// Fails with [`ScoreError::MissingMedians`] before reading any scaffold if
/// the baselines have not been computed.
pub async fn score_scaffolds<S>(
    store: &S,
    table: &Identifier,
    range: ScoreRange,
    no_write: bool,
) -> Result<ScoreSummary>
where
    S: ActivityStore + ?Sized,
{
    let medians = store.medians().await?.ok_or(ScoreError::MissingMedians)?;
    let started = Instant::now();

    let (min_id, max_id) = match (range.min_id, range.max_id) {
        (Some(lo), Some(hi)) => (lo, hi),
        (lo, hi) => match store.scaffold_id_range(table).await? {
            Some((first, last)) => (lo.unwrap_or(first), hi.unwrap_or(last)),
            None => {
                error!(%table, "No scaffolds to score");
                return Ok(ScoreSummary::default());
            }
        },
    };
    info!(%table, min_id, max_id, "Scoring scaffolds");

    let rows = store.scaffold_rows(table, min_id, max_id).await?;
    if rows.is_empty() {
        error!(%table, min_id, max_id, "No scaffolds in range");
        return Ok(ScoreSummary::default());
    }
    let mut summary = ScoreSummary::default();
    let mut scores: Vec<(Option<f64>, ScafId)> = Vec::with_capacity(rows.len());

    for row in &rows {
        let pscore = score_counts(&row.counts, &medians);
        match pscore {
            None => summary.n_null += 1,
            Some(p) if p == 0.0 => summary.n_zero += 1,
            Some(_) => summary.n_gtzero += 1,
        }
        debug!(scaf_id = row.id, pscore = ?pscore, "Scaffold scored");
        scores.push((pscore, row.id));
    }
    summary.n_scaf = rows.len();

    if !no_write && !scores.is_empty() {
        summary.n_update = store.update_scores(table, &scores).await?;
    }

    info!(
        %table,
        n_scaf = summary.n_scaf,
        n_null = summary.n_null,
        n_zero = summary.n_zero,
        n_gtzero = summary.n_gtzero,
        n_update = summary.n_update,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Score pass complete"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use badapple_common::{Medians, ScaffoldCounts};
    use badapple_db::{ActivityWriter, MemoryStore};

    fn counts(tested: i64, active: i64) -> ScaffoldCounts {
        ScaffoldCounts {
            nsub_tested: tested,
            nsub_active: active,
            nass_tested: tested,
            nass_active: active,
            nsam_tested: tested,
            nsam_active: active,
            ..Default::default()
        }
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.set_scaffold_counts("scaffold", 1, counts(0, 0));
        store.set_scaffold_counts("scaffold", 2, counts(4, 0));
        store.set_scaffold_counts("scaffold", 3, counts(4, 4));
        store
            .store_medians(&Medians {
                median_ncpd_tested: 1.0,
                median_nsub_tested: 1.0,
                median_nass_tested: 1.0,
                median_nsam_tested: 1.0,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_missing_medians_is_distinct_error() {
        let store = MemoryStore::new();
        store.add_scaffold("scaffold", 1);
        let err = score_scaffolds(&store, &Identifier::default_scaffold_table(), ScoreRange::default(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ScoreError::MissingMedians));
    }

    #[tokio::test]
    async fn test_summary_and_single_batch() {
        let store = store().await;
        store.set_pscore("scaffold", 1, Some(77.0));
        let table = Identifier::default_scaffold_table();
        let summary = score_scaffolds(&store, &table, ScoreRange::default(), false).await.unwrap();

        assert_eq!(
            summary,
            ScoreSummary { n_scaf: 3, n_null: 1, n_zero: 1, n_gtzero: 1, n_update: 3 }
        );
        assert_eq!(store.score_batches(), 1);
        // stale score cleared
        assert_eq!(store.scaffold_default(1).unwrap().pscore, None);
        assert_eq!(store.scaffold_default(2).unwrap().pscore, Some(0.0));
        // 100000 * (4/5)^3
        assert_eq!(store.scaffold_default(3).unwrap().pscore, Some(51200.0));
    }

    #[tokio::test]
    async fn test_explicit_range() {
        let store = store().await;
        let table = Identifier::default_scaffold_table();
        let range = ScoreRange { min_id: Some(2), max_id: None };
        let summary = score_scaffolds(&store, &table, range, false).await.unwrap();
        assert_eq!(summary.n_scaf, 2);
        assert_eq!(summary.n_null, 0);
    }

    #[tokio::test]
    async fn test_range_without_rows_writes_nothing() {
        let store = store().await;
        let table = Identifier::default_scaffold_table();
        let range = ScoreRange { min_id: Some(10), max_id: Some(20) };
        let summary = score_scaffolds(&store, &table, range, false).await.unwrap();
        assert_eq!(summary, ScoreSummary::default());
        assert_eq!(store.score_batches(), 0);
    }

    #[tokio::test]
    async fn test_no_write() {
        let store = store().await;
        let table = Identifier::default_scaffold_table();
        let summary = score_scaffolds(&store, &table, ScoreRange::default(), true).await.unwrap();
        assert_eq!(summary.n_update, 0);
        assert_eq!(store.score_batches(), 0);
        assert_eq!(store.scaffold_default(3).unwrap().pscore, None);
    }

    #[tokio::test]
    async fn test_empty_table_is_not_an_error() {
        let store = store().await;
        store.create_scaffold_table("empty");
        let table = Identifier::new("empty").unwrap();
        let summary = score_scaffolds(&store, &table, ScoreRange::default(), false).await.unwrap();
        assert_eq!(summary, ScoreSummary::default());
    }
}
