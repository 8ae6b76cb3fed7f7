//! badapple-scorer: Promiscuity score (pScore) computation.
//!
//! Scores are built from a scaffold's substance, assay and sample counters,
//! each shrunk towards the population median so sparsely tested scaffolds
//! cannot produce inflated values.

pub mod error;
pub mod scorer;
pub mod medians;
pub mod annotate;
pub mod filter;

pub use error::{Result, ScoreError};
pub use scorer::{compute_score, score_counts};
pub use medians::{compute_medians, median};
pub use annotate::{score_scaffolds, ScoreRange, ScoreSummary};
pub use filter::{compound_passes, passes_filter, FilterOptions, ScaffoldHit};
