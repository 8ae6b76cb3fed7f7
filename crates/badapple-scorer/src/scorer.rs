//! pScore formula.
//!
//! ```text
//! pScore = round(100000 * sA/(sT + med_sT) * aA/(aT + med_aT) * wA/(wT + med_wT))
//! ```
//!
//! s = substances, a = assays, w = samples (wells); T = tested, A = active.
//! Ties round to even.

use badapple_common::{Medians, ScaffoldCounts};

/// Compute the pScore, or `None` when any tested count is zero ("no evidence",
/// distinct from a score of 0).
#[allow(clippy::too_many_arguments)]
pub fn compute_score(
    s_tested: i64,
    s_active: i64,
    a_tested: i64,
    a_active: i64,
    w_tested: i64,
    w_active: i64,
    median_s_tested: f64,
    median_a_tested: f64,
    median_w_tested: f64,
) -> Option<f64> {
    if s_tested == 0 || a_tested == 0 || w_tested == 0 {
        return None;
    }
    // Strict left-to-right order. Regrouping the factors can move a result
    // across an x.5 tie by one ulp.
    let raw = s_active as f64 / (s_tested as f64 + median_s_tested) * a_active as f64
        / (a_tested as f64 + median_a_tested)
        * w_active as f64
        / (w_tested as f64 + median_w_tested)
        * 100.0
        * 1000.0;
    Some(raw.round_ties_even())
}

/// Score a scaffold row against the stored baselines.
pub fn score_counts(counts: &ScaffoldCounts, medians: &Medians) -> Option<f64> {
    compute_score(
        counts.nsub_tested,
        counts.nsub_active,
        counts.nass_tested,
        counts.nass_active,
        counts.nsam_tested,
        counts.nsam_active,
        medians.median_nsub_tested,
        medians.median_nass_tested,
        medians.median_nsam_tested,
    )
}
