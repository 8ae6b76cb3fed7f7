//! Subcommand bodies, generic over the store so they run against the
//! in-memory store in tests.

use crate::config::{AnnotateConfig, ScoringConfig};
use anyhow::Context;
use badapple_annotate::{
    annotate_compounds, annotate_scaffolds, CompoundPassSummary, CompoundsAnnotated,
    ScaffoldPassSummary,
};
use badapple_common::{write_aid_file, Medians, ScafId};
use badapple_db::ActivityStore;
use badapple_scorer::{compute_medians, score_scaffolds, ScoreRange, ScoreSummary};
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// Combined report for `badapple annotate`.
#[derive(Debug, Serialize)]
pub struct AnnotateReport {
    pub compounds: CompoundPassSummary,
    pub scaffolds: ScaffoldPassSummary,
}

pub async fn run_compound_pass<S>(
    store: &S,
    cfg: &AnnotateConfig,
) -> anyhow::Result<(CompoundPassSummary, CompoundsAnnotated)>
where
    S: ActivityStore + ?Sized,
{
    let filter = cfg.assay_filter()?;
    annotate_compounds(store, &filter, cfg.no_write, &cfg.bounds())
        .await
        .context("compound pass aborted")
}

pub async fn run_scaffold_pass<S>(
    store: &S,
    cfg: &AnnotateConfig,
    done: &CompoundsAnnotated,
) -> anyhow::Result<ScaffoldPassSummary>
where
    S: ActivityStore + ?Sized,
{
    let filter = cfg.assay_filter()?;
    let opts = cfg.scaffold_options()?;
    annotate_scaffolds(store, done, &filter, &opts, &cfg.bounds())
        .await
        .context("scaffold pass aborted")
}

/// Compounds first, then scaffolds. Skip/limit bounds apply to each pass.
pub async fn run_annotate<S>(store: &S, cfg: &AnnotateConfig) -> anyhow::Result<AnnotateReport>
where
    S: ActivityStore + ?Sized,
{
    let (compounds, done) = run_compound_pass(store, cfg).await?;
    let scaffolds = run_scaffold_pass(store, cfg, &done).await?;
    Ok(AnnotateReport { compounds, scaffolds })
}

pub async fn run_medians<S>(store: &S, cfg: &ScoringConfig) -> anyhow::Result<Medians>
where
    S: ActivityStore + ?Sized,
{
    let table = cfg.table()?;
    compute_medians(store, &table).await.context("median computation failed")
}

pub async fn run_score<S>(
    store: &S,
    cfg: &ScoringConfig,
    range: ScoreRange,
    no_write: bool,
) -> anyhow::Result<ScoreSummary>
where
    S: ActivityStore + ?Sized,
{
    let table = cfg.table()?;
    score_scaffolds(store, &table, range, no_write)
        .await
        .context("score pass aborted")
}

/// Write the assays recorded as active evidence for one scaffold.
pub async fn run_export_aids<S>(store: &S, scaf_id: ScafId, output: &Path) -> anyhow::Result<usize>
where
    S: ActivityStore + ?Sized,
{
    let aids = store.active_assays(scaf_id).await?;
    let n = write_aid_file(aids, output)
        .with_context(|| format!("writing {}", output.display()))?;
    info!(scaf_id, n_aids = n, output = %output.display(), "Active assays exported");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use badapple_common::read_aid_file;
    use badapple_db::ActivityReader;
    use badapple_test_utils::{random_store, Fixture, RandomShape};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_full_pipeline_on_memory_store() {
        let store = Fixture::new()
            .compound(1, &[&[(1, 2), (2, 1)], &[(1, 1)]])
            .compound(2, &[&[(1, 2), (3, 2)]])
            .compound(3, &[&[]])
            .scaffold(10, &[1, 2])
            .scaffold(11, &[3])
            .build();

        let cfg = AnnotateConfig { write_active_assay_provenance: true, ..Default::default() };
        let report = run_annotate(&store, &cfg).await.unwrap();
        assert_eq!(report.compounds.n_compounds, 3);
        assert_eq!(report.compounds.n_written, 3);
        assert_eq!(report.scaffolds.n_scaffolds, 2);
        assert_eq!(report.scaffolds.n_errors, 0);

        let scaf = store.scaffold_default(10).unwrap().counts;
        assert_eq!(scaf.ncpd_total, 2);
        assert_eq!(scaf.nass_tested, 3);
        assert_eq!(scaf.nass_active, 2);
        assert_eq!(store.active_assay_rows(), vec![(10, 1), (10, 3)]);

        let scoring = ScoringConfig::default();
        let medians = run_medians(&store, &scoring).await.unwrap();
        assert_eq!(store.medians().await.unwrap(), Some(medians));

        let summary = run_score(&store, &scoring, ScoreRange::default(), false).await.unwrap();
        assert_eq!(summary.n_scaf, 2);
        assert_eq!(summary.n_null, 1);
        assert_eq!(summary.n_gtzero, 1);
        assert!(store.scaffold_default(10).unwrap().pscore.unwrap() > 0.0);
        assert_eq!(store.scaffold_default(11).unwrap().pscore, None);
    }

    #[tokio::test]
    async fn test_score_before_medians_fails() {
        let store = Fixture::new().compound(1, &[&[(1, 2)]]).scaffold(1, &[1]).build();
        run_annotate(&store, &AnnotateConfig::default()).await.unwrap();
        assert!(run_score(&store, &ScoringConfig::default(), ScoreRange::default(), false)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_export_aids_round_trips_through_file() {
        let store = Fixture::new().compound(1, &[&[(5, 2), (4, 5), (9, 1)]]).scaffold(1, &[1]).build();
        let cfg = AnnotateConfig { write_active_assay_provenance: true, ..Default::default() };
        run_annotate(&store, &cfg).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaf1.aids");
        assert_eq!(run_export_aids(&store, 1, &path).await.unwrap(), 2);
        assert_eq!(read_aid_file(&path).unwrap().into_iter().collect::<Vec<_>>(), vec![4, 5]);
    }

    #[tokio::test]
    async fn test_bounds_apply_to_both_passes() {
        let store = random_store(11, RandomShape::default());
        let cfg = AnnotateConfig { n_skip: 2, n_max: 5, ..Default::default() };
        let report = run_annotate(&store, &cfg).await.unwrap();
        assert_eq!(report.compounds.n_compounds, 5);
        assert_eq!(report.scaffolds.n_scaffolds, 5);
    }
}
