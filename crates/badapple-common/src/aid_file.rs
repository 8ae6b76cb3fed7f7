//! Assay-id list files: one integer assay id per line.
//!
//! Used both as the assay allow-list for custom scores and as the export
//! format for the assays recorded against a scaffold.

use crate::entities::Aid;
use crate::error::{BadappleError, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

/// Read an assay-id file. Blank lines and lines that are not plain digits
/// are skipped.
pub fn read_aid_file(path: impl AsRef<Path>) -> Result<BTreeSet<Aid>> {
    let content = std::fs::read_to_string(path.as_ref())?;
    let mut aids = BTreeSet::new();
    let mut skipped = 0usize;

    for (idx, line) in content.lines().enumerate() {
        let value = line.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            skipped += 1;
            continue;
        }
        let aid: Aid = value.parse().map_err(|_| BadappleError::InvalidAssayId {
            line: idx + 1,
            value: value.to_string(),
        })?;
        aids.insert(aid);
    }

    tracing::debug!(
        path = %path.as_ref().display(),
        n_aids = aids.len(),
        skipped,
        "Read assay id file"
    );
    Ok(aids)
}

/// Write assay ids de-duplicated and in ascending order, one per line.
pub fn write_aid_file<I>(aids: I, path: impl AsRef<Path>) -> Result<usize>
where
    I: IntoIterator<Item = Aid>,
{
    let sorted: BTreeSet<Aid> = aids.into_iter().collect();
    let mut out = std::io::BufWriter::new(std::fs::File::create(path.as_ref())?);
    for aid in &sorted {
        writeln!(out, "{aid}")?;
    }
    out.flush()?;
    Ok(sorted.len())
}
