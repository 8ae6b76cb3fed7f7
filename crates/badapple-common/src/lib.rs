//! badapple-common: Shared records, errors, and file helpers used across all Badapple crates.

pub mod error;
pub mod entities;
pub mod aid_file;

// Re-export commonly used types
pub use error::{BadappleError, Result};
pub use entities::{
    Aid, Cid, ScafId, Sid,
    ActivityResult, CompoundCounts, CompoundOutcome, CompoundRow, Medians,
    ScaffoldCounts, ScaffoldRow, SubstanceOutcome,
};
pub use aid_file::{read_aid_file, write_aid_file};
