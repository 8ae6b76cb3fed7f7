//! `badapple filter`: flag compounds whose scaffolds look promiscuous.
//!
//! Input is a TSV with a header and one row per (compound, scaffold) pair:
//!
//! ```text
//! name    pscore  in_drug in_db
//! cpd1    812     false   true
//! cpd1            false   true
//! cpd2                    false
//! ```
//!
//! Output has one row per compound, in first-seen order: `name`, `passes_filter`.

use anyhow::Context;
use badapple_scorer::{compound_passes, FilterOptions, ScaffoldHit};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct HitRecord {
    name: String,
    #[serde(default)]
    pscore: Option<f64>,
    #[serde(default, deserialize_with = "loose_bool")]
    in_drug: Option<bool>,
    #[serde(default, deserialize_with = "loose_bool")]
    in_db: Option<bool>,
}

#[derive(Debug, Serialize)]
struct Verdict<'a> {
    name: &'a str,
    passes_filter: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterCounts {
    pub n_compounds: usize,
    pub n_pass: usize,
    pub n_fail: usize,
}

/// Accepts `true/false`, `True/False`, `t/f`, `1/0`; empty is `None`.
fn loose_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => match v.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(Some(true)),
            "false" | "f" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("not a boolean: {other:?}"))),
        },
    }
}

impl HitRecord {
    /// `None` when the scaffold is not in the database.
    fn hit(&self) -> Option<ScaffoldHit> {
        if !self.in_db.unwrap_or(false) {
            return None;
        }
        Some(ScaffoldHit {
            pscore: self.pscore,
            in_drug: self.in_drug.unwrap_or(false),
        })
    }
}

pub fn filter_compounds(input: &Path, output: &Path, opts: &FilterOptions) -> anyhow::Result<FilterCounts> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(input)
        .with_context(|| format!("opening {}", input.display()))?;

    let mut order: Vec<String> = Vec::new();
    let mut hits: HashMap<String, Vec<Option<ScaffoldHit>>> = HashMap::new();
    for (idx, record) in reader.deserialize::<HitRecord>().enumerate() {
        let record = record.with_context(|| format!("{}: row {}", input.display(), idx + 2))?;
        let hit = record.hit();
        let entry = hits.entry(record.name.clone()).or_insert_with(|| {
            order.push(record.name.clone());
            Vec::new()
        });
        // A compound listed with an empty scaffold row has no scaffolds.
        if record.in_db.is_some() || record.pscore.is_some() {
            entry.push(hit);
        }
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(output)
        .with_context(|| format!("creating {}", output.display()))?;
    let mut counts = FilterCounts::default();
    for name in &order {
        let passes = hits.get(name).map_or(true, |h| compound_passes(h, opts));
        writer.serialize(Verdict { name, passes_filter: passes })?;
        counts.n_compounds += 1;
        if passes {
            counts.n_pass += 1;
        } else {
            counts.n_fail += 1;
        }
    }
    writer.flush()?;

    tracing::info!(
        n_compounds = counts.n_compounds,
        n_pass = counts.n_pass,
        n_fail = counts.n_fail,
        pscore_max = opts.pscore_max,
        ignore_in_drug = opts.ignore_in_drug,
        "Compound filter applied"
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const INPUT: &str = "name\tpscore\tin_drug\tin_db\n\
                         risky\t812\tFalse\tTrue\n\
                         risky\t10\tFalse\tTrue\n\
                         drug\t900\tTrue\tTrue\n\
                         unscored\t\tFalse\tTrue\n\
                         unknown\t\t\tFalse\n";

    fn run(opts: FilterOptions) -> (FilterCounts, String) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        let output = dir.path().join("out.tsv");
        std::fs::write(&input, INPUT).unwrap();
        let counts = filter_compounds(&input, &output, &opts).unwrap();
        (counts, std::fs::read_to_string(&output).unwrap())
    }

    #[test]
    fn test_filter_verdicts() {
        let (counts, out) = run(FilterOptions::default());
        assert_eq!(
            out,
            "name\tpasses_filter\nrisky\tfalse\ndrug\ttrue\nunscored\ttrue\nunknown\ttrue\n"
        );
        assert_eq!(counts, FilterCounts { n_compounds: 4, n_pass: 3, n_fail: 1 });
    }

    #[test]
    fn test_ignore_in_drug() {
        let opts = FilterOptions { ignore_in_drug: true, ..Default::default() };
        let (counts, out) = run(opts);
        assert!(out.contains("drug\tfalse"));
        assert_eq!(counts.n_fail, 2);
    }

    #[test]
    fn test_loose_bool_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.tsv");
        std::fs::write(&input, "name\tpscore\tin_drug\tin_db\nx\t1\tmaybe\ttrue\n").unwrap();
        let res = filter_compounds(&input, &dir.path().join("out.tsv"), &FilterOptions::default());
        assert!(res.is_err());
    }
}
