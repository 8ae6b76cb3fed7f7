//! Configuration loading for Badapple.
//! Reads badapple.toml from `--config`, the BADAPPLE_CONFIG env var, or the
//! current directory, in that order.

use anyhow::Context;
use badapple_annotate::{AssayFilter, BatchBounds, ScaffoldOptions};
use badapple_common::read_aid_file;
use badapple_db::{Identifier, StoreLayout};
use badapple_scorer::FilterOptions;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "BADAPPLE_CONFIG";
pub const DATABASE_URL_ENV: &str = "BADAPPLE_DATABASE_URL";
const DEFAULT_CONFIG_FILE: &str = "badapple.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    /// libpq-style connection string, e.g. `host=localhost dbname=badapple2 user=...`.
    #[serde(deserialize_with = "secret_string")]
    pub url: SecretString,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_schema")]
    pub activity_schema: String,
    #[serde(default = "default_assay_column")]
    pub assay_column: String,
}

fn secret_string<'de, D: Deserializer<'de>>(d: D) -> Result<SecretString, D::Error> {
    String::deserialize(d).map(SecretString::from)
}

fn default_schema()       -> String { "public".to_string() }
fn default_assay_column() -> String { "aid".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct AnnotateConfig {
    #[serde(default = "default_scaffold_table")]
    pub scaffold_table: String,
    #[serde(default)]
    pub aid_file: Option<PathBuf>,
    #[serde(default)]
    pub nass_tested_min: Option<i64>,
    #[serde(default)]
    pub n_skip: usize,
    #[serde(default)]
    pub n_max: usize,
    #[serde(default)]
    pub no_write: bool,
    #[serde(default)]
    pub write_active_assay_provenance: bool,
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,
}

fn default_scaffold_table() -> String { badapple_db::DEFAULT_SCAFFOLD_TABLE.to_string() }
fn default_progress_every() -> usize  { 1000 }

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            scaffold_table: default_scaffold_table(),
            aid_file: None,
            nass_tested_min: None,
            n_skip: 0,
            n_max: 0,
            no_write: false,
            write_active_assay_provenance: false,
            progress_every: default_progress_every(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_scaffold_table")]
    pub scaffold_table: String,
    #[serde(default = "default_pscore_max")]
    pub pscore_max: f64,
    #[serde(default)]
    pub ignore_in_drug: bool,
}

fn default_pscore_max() -> f64 { 300.0 }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            scaffold_table: default_scaffold_table(),
            pscore_max: default_pscore_max(),
            ignore_in_drug: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Write logs here instead of stderr.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Run-time overrides taken from the command line. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct AnnotateOverrides {
    pub scaffold_table: Option<String>,
    pub aid_file: Option<PathBuf>,
    pub nass_tested_min: Option<i64>,
    pub n_skip: Option<usize>,
    pub n_max: Option<usize>,
    pub no_write: bool,
    pub write_active_assays: bool,
}

/// The sections `badapple filter` reads. It never connects, so `[database]`
/// may be absent.
#[derive(Debug, Default, Deserialize)]
pub struct OfflineConfig {
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}


/// An explicit path wins over BADAPPLE_CONFIG, which wins over ./badapple.toml.
fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE)),
    }
}

impl OfflineConfig {
    /// Defaults when no config file is found and none was named. A file that
    /// exists but cannot be read or parsed is an error.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = config_path(explicit);
        if !path.exists() {
            if explicit.is_some() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl Config {
    /// Load configuration from the resolved path. BADAPPLE_DATABASE_URL
    /// replaces the file's URL.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = config_path(explicit);

        if !path.exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Pass --config or set {} to point at a badapple.toml.",
                path.display(),
                CONFIG_ENV
            );
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            config.database.url = SecretString::from(url);
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validated table locations.
    pub fn layout(&self) -> anyhow::Result<StoreLayout> {
        StoreLayout::new(
            &self.database.schema,
            &self.database.activity_schema,
            &self.database.assay_column,
        )
        .context("invalid [database] schema or column name")
    }
}

impl AnnotateConfig {
    pub fn apply(&mut self, o: &AnnotateOverrides) {
        if let Some(t) = &o.scaffold_table {
            self.scaffold_table = t.clone();
        }
        if let Some(f) = &o.aid_file {
            self.aid_file = Some(f.clone());
        }
        if o.nass_tested_min.is_some() {
            self.nass_tested_min = o.nass_tested_min;
        }
        if let Some(n) = o.n_skip {
            self.n_skip = n;
        }
        if let Some(n) = o.n_max {
            self.n_max = n;
        }
        self.no_write |= o.no_write;
        self.write_active_assay_provenance |= o.write_active_assays;
    }

    pub fn bounds(&self) -> BatchBounds {
        BatchBounds {
            n_skip: self.n_skip,
            n_max: self.n_max,
            progress_every: self.progress_every,
        }
    }

    /// The assay allow-list, read from `aid_file` when one is configured.
    pub fn assay_filter(&self) -> anyhow::Result<AssayFilter> {
        match &self.aid_file {
            Some(path) => {
                let aids = read_aid_file(path)
                    .with_context(|| format!("reading assay id file {}", path.display()))?;
                Ok(AssayFilter::from(aids))
            }
            None => Ok(AssayFilter::all()),
        }
    }

    pub fn scaffold_options(&self) -> anyhow::Result<ScaffoldOptions> {
        Ok(ScaffoldOptions {
            table: Identifier::new(self.scaffold_table.as_str())
                .context("invalid scaffold table name")?,
            nass_tested_min: self.nass_tested_min,
            write_active_assays: self.write_active_assay_provenance,
            no_write: self.no_write,
        })
    }
}

impl ScoringConfig {
    pub fn table(&self) -> anyhow::Result<Identifier> {
        Identifier::new(self.scaffold_table.as_str()).context("invalid scaffold table name")
    }

    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            pscore_max: self.pscore_max,
            ignore_in_drug: self.ignore_in_drug,
        }
    }
}
