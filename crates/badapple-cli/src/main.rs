//! Badapple command-line driver.
//!
//! Each phase is its own subcommand so a long run can be resumed or split:
//! `init-db`, `annotate-compounds`, `annotate-scaffolds` (or `annotate` for
//! both), `medians`, `score`. Results are printed to stdout as JSON; logs go
//! to stderr or the configured log file.

mod commands;
mod compound_filter;
mod config;

use anyhow::Context;
use badapple_annotate::CompoundsAnnotated;
use badapple_db::{Identifier, PgStore};
use badapple_scorer::ScoreRange;
use clap::{ArgAction, Args, Parser, Subcommand};
use config::{AnnotateOverrides, Config, LoggingConfig, OfflineConfig, ScoringConfig};
use secrecy::ExposeSecret;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "badapple")]
#[command(about = "Badapple: scaffold activity statistics and promiscuity scores", long_about = None)]
#[command(version)]
struct Cli {
    /// Config TOML file (default: $BADAPPLE_CONFIG, then ./badapple.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create missing tables, and the configured scaffold table if it is not the default
    InitDb {
        #[arg(long)]
        scaffold_table: Option<String>,
    },
    /// Recompute compound counters from raw outcomes
    AnnotateCompounds(AnnotateArgs),
    /// Recompute scaffold counters from compound counters (compounds must be current)
    AnnotateScaffolds(AnnotateArgs),
    /// Compound pass followed by scaffold pass
    Annotate(AnnotateArgs),
    /// Compute and store the median baselines over a scaffold table
    Medians {
        #[arg(long)]
        scaffold_table: Option<String>,
    },
    /// Score scaffolds and write pScores in one batch
    Score {
        #[arg(long)]
        scaffold_table: Option<String>,
        /// Lowest scaffold id to score (default: smallest in table)
        #[arg(long)]
        min_id: Option<i64>,
        /// Highest scaffold id to score (default: largest in table)
        #[arg(long)]
        max_id: Option<i64>,
        #[arg(long, action = ArgAction::SetTrue)]
        no_write: bool,
    },
    /// Write the active assays recorded for a scaffold to an assay id file
    ExportAids {
        #[arg(long)]
        scaf_id: i64,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Flag compounds whose scaffolds score at or above pscore_max
    Filter {
        /// TSV with columns name, pscore, in_drug, in_db
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long)]
        pscore_max: Option<f64>,
        #[arg(long, action = ArgAction::SetTrue)]
        ignore_in_drug: bool,
    },
}

#[derive(Args, Debug, Clone)]
struct AnnotateArgs {
    /// Compute without writing
    #[arg(long, action = ArgAction::SetTrue)]
    no_write: bool,
    /// Skip this many entities (ascending id order)
    #[arg(long)]
    n_skip: Option<usize>,
    /// Process at most this many entities (0 = all)
    #[arg(long)]
    n_max: Option<usize>,
    /// Restrict to the assay ids listed in this file
    #[arg(long, value_name = "FILE")]
    aid_file: Option<PathBuf>,
    /// Leave compounds tested in fewer assays out of scaffold rollups
    #[arg(long)]
    nass_tested_min: Option<i64>,
    /// Scaffold table receiving the counters
    #[arg(long)]
    scaffold_table: Option<String>,
    /// Record (scaffold, assay) rows for active assays
    #[arg(long, action = ArgAction::SetTrue)]
    write_active_assays: bool,
}

impl From<&AnnotateArgs> for AnnotateOverrides {
    fn from(a: &AnnotateArgs) -> Self {
        Self {
            scaffold_table: a.scaffold_table.clone(),
            aid_file: a.aid_file.clone(),
            nass_tested_min: a.nass_tested_min,
            n_skip: a.n_skip,
            n_max: a.n_max,
            no_write: a.no_write,
            write_active_assays: a.write_active_assays,
        }
    }
}

fn init_logging(verbose: u8, cli_file: Option<PathBuf>, cfg: &LoggingConfig) -> anyhow::Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("badapple={level},warn")));

    match cli_file.or_else(|| cfg.file.clone()) {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<PgStore> {
    let store = PgStore::connect(config.database.url.expose_secret(), config.layout()?)
        .await
        .context("cannot open the database")?;
    Ok(store)
}

fn with_table(scoring: &ScoringConfig, table: Option<String>) -> ScoringConfig {
    match table {
        Some(t) => ScoringConfig { scaffold_table: t, ..scoring.clone() },
        None => scoring.clone(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The filter works on files only and does not need a database section.
    if let Commands::Filter { input, output, pscore_max, ignore_in_drug } = &cli.command {
        let offline = OfflineConfig::load(cli.config.as_deref())?;
        init_logging(cli.verbose, cli.log_file.clone(), &offline.logging)?;
        let mut opts = offline.scoring.filter_options();
        if let Some(max) = pscore_max {
            opts.pscore_max = *max;
        }
        opts.ignore_in_drug |= *ignore_in_drug;
        let counts = compound_filter::filter_compounds(input, output, &opts)?;
        return print_json(&counts);
    }

    let mut config = Config::load(cli.config.as_deref())?;
    init_logging(cli.verbose, cli.log_file.clone(), &config.logging)?;
    info!(version = env!("CARGO_PKG_VERSION"), "Badapple starting");

    let store = connect(&config).await?;

    match cli.command {
        Commands::InitDb { scaffold_table } => {
            store.initialize().await.context("schema bootstrap failed")?;
            let name = scaffold_table.unwrap_or_else(|| config.annotate.scaffold_table.clone());
            let table = Identifier::new(name.as_str()).context("invalid scaffold table name")?;
            store.create_scaffold_table(&table).await?;
            info!(schema = %store.layout().schema, %table, "Schema ready");
        }
        Commands::AnnotateCompounds(args) => {
            config.annotate.apply(&AnnotateOverrides::from(&args));
            let (summary, _) = commands::run_compound_pass(&store, &config.annotate).await?;
            print_json(&summary)?;
        }
        Commands::AnnotateScaffolds(args) => {
            config.annotate.apply(&AnnotateOverrides::from(&args));
            let done = CompoundsAnnotated::from_previous_run();
            let summary = commands::run_scaffold_pass(&store, &config.annotate, &done).await?;
            print_json(&summary)?;
        }
        Commands::Annotate(args) => {
            config.annotate.apply(&AnnotateOverrides::from(&args));
            let report = commands::run_annotate(&store, &config.annotate).await?;
            print_json(&report)?;
        }
        Commands::Medians { scaffold_table } => {
            let scoring = with_table(&config.scoring, scaffold_table);
            let medians = commands::run_medians(&store, &scoring).await?;
            print_json(&medians)?;
        }
        Commands::Score { scaffold_table, min_id, max_id, no_write } => {
            let scoring = with_table(&config.scoring, scaffold_table);
            let range = ScoreRange { min_id, max_id };
            let summary = commands::run_score(&store, &scoring, range, no_write).await?;
            print_json(&summary)?;
        }
        Commands::ExportAids { scaf_id, output } => {
            let n = commands::run_export_aids(&store, scaf_id, &output).await?;
            print_json(&serde_json::json!({ "scaf_id": scaf_id, "n_aids": n }))?;
        }
        // Handled before connecting.
        Commands::Filter { .. } => {}
    }
    Ok(())
}
