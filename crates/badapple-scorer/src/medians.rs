//! Population medians used as score baselines.

use crate::error::Result;
use badapple_common::Medians;
use badapple_db::{ActivityStore, Identifier};
use tracing::{error, info};

/// Standard median: middle value, or the mean of the two middle values for
/// an even count. An empty population gives 0.
pub fn median(values: &mut [i64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sort_unstable();
    if n % 2 == 1 {
        values[n / 2] as f64
    } else {
        (values[n / 2 - 1] as f64 + values[n / 2] as f64) / 2.0
    }
}

/// Compute the four baselines over every row of `table` and store them,
/// replacing any previous snapshot.
pub async fn compute_medians<S>(store: &S, table: &Identifier) -> Result<Medians>
where
    S: ActivityStore + ?Sized,
{
    let rows = match store.scaffold_id_range(table).await? {
        Some((min_id, max_id)) => store.scaffold_rows(table, min_id, max_id).await?,
        None => {
            error!(%table, "No scaffolds; medians default to 0");
            Vec::new()
        }
    };

    let mut ncpd: Vec<i64> = rows.iter().map(|r| r.counts.ncpd_tested).collect();
    let mut nsub: Vec<i64> = rows.iter().map(|r| r.counts.nsub_tested).collect();
    let mut nass: Vec<i64> = rows.iter().map(|r| r.counts.nass_tested).collect();
    let mut nsam: Vec<i64> = rows.iter().map(|r| r.counts.nsam_tested).collect();

    let medians = Medians {
        median_ncpd_tested: median(&mut ncpd),
        median_nsub_tested: median(&mut nsub),
        median_nass_tested: median(&mut nass),
        median_nsam_tested: median(&mut nsam),
    };
    store.store_medians(&medians).await?;

    info!(
        %table,
        n_scaf = rows.len(),
        median_ncpd_tested = medians.median_ncpd_tested,
        median_nsub_tested = medians.median_nsub_tested,
        median_nass_tested = medians.median_nass_tested,
        median_nsam_tested = medians.median_nsam_tested,
        "Medians stored"
    );
    Ok(medians)
}
