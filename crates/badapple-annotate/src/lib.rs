//! badapple-annotate: Activity statistics for compounds and scaffolds.
//!
//! Raw `(sid, aid, outcome)` records are classified, rolled up per compound,
//! then rolled up again per scaffold with assay-level de-duplication. The
//! [`batch`] module drives both passes over whole tables.

pub mod error;
pub mod outcome;
pub mod options;
pub mod compound;
pub mod scaffold;
pub mod batch;

pub use error::{AnnotateError, Result};
pub use outcome::{classify, AssayTally, Classification, SubstanceTally};
pub use options::{AssayFilter, BatchBounds, ScaffoldOptions};
pub use compound::{annotate_compound, compound_counts, CompoundAnnotation};
pub use scaffold::{annotate_scaffold, ScaffoldAnnotation};
pub use batch::{
    annotate_compounds, annotate_scaffolds, CompoundPassSummary, CompoundsAnnotated,
    ScaffoldPassSummary,
};
