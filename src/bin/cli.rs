//! BASE crawler CLI
//!
//! Local execution entry point for synchronization and cache maintenance.

use std::path::PathBuf;

use base_crawler::{
    config,
    context::Context,
    error::{AppError, Result},
    models::{Config, RecordKind, SyncConfig},
    pipeline::{self, PipelineOptions, RecomputeTargets},
    services::{AnalysisCache, RecomputeScope, SyncOptions, SyncStart},
    storage::LookupTable,
};
use clap::{Args, Parser, Subcommand};

/// base-crawler - Portuguese public procurement synchronizer
#[derive(Parser, Debug)]
#[command(
    name = "base-crawler",
    version,
    about = "Synchronizes BASE procurement data and keeps derived data current"
)]
struct Cli {
    /// Directory holding data/config.toml; relative paths resolve against it
    #[arg(short, long, default_value = ".")]
    base_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone)]
struct SyncArgs {
    /// Start from the beginning of the id space
    #[arg(long, conflicts_with_all = ["offset", "from"])]
    bootstrap: bool,

    /// Start this many ids below the last known one (default from config)
    #[arg(
        long,
        num_args = 0..=1,
        conflicts_with = "from",
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    offset: Option<Option<i64>>,

    /// Start right after this id
    #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
    from: Option<i64>,

    /// Ignore snapshots and refetch every id
    #[arg(long)]
    flush: bool,

    /// Override the configured consecutive-failure threshold
    #[arg(long)]
    max_failures: Option<u32>,
}

impl SyncArgs {
    fn options(&self, sync: &SyncConfig) -> SyncOptions {
        let start = if self.bootstrap {
            SyncStart::Bootstrap
        } else if let Some(id) = self.from {
            SyncStart::From(id)
        } else if let Some(n) = self.offset {
            SyncStart::Offset(n.unwrap_or(sync.resume_offset))
        } else {
            SyncStart::Resume
        };
        SyncOptions {
            start,
            flush: self.flush,
            max_consecutive_failures: self.max_failures,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl static lookup lists (contract types, districts, ...)
    Static {
        /// Recrawl even if the lists are already stored
        #[arg(long)]
        force: bool,
    },

    /// Synchronize records from upstream
    Sync {
        /// Kinds to sync (entities, contracts, tenders); all when omitted
        kinds: Vec<RecordKind>,

        #[command(flatten)]
        args: SyncArgs,
    },

    /// Recompute aggregates and analysis caches
    Cache {
        /// Everything below
        #[arg(long)]
        all: bool,

        /// Entity aggregates
        #[arg(long)]
        entities: bool,

        /// Only entities marked stale
        #[arg(long)]
        stale_only: bool,

        /// Category aggregates
        #[arg(long)]
        categories: bool,

        /// Analyses; repeat to pick by name, empty value for all
        #[arg(long, num_args = 0..)]
        analysis: Option<Vec<String>>,
    },

    /// Run full pipeline: Static → Sync → Recompute
    Pipeline {
        #[command(flatten)]
        args: SyncArgs,

        /// Recrawl static lists even if present
        #[arg(long)]
        force_static: bool,
    },

    /// Validate configuration files
    Validate,

    /// Show store contents and sync cursors
    Info,
}

/// Level from `--verbose`, else `[logging] level` from the config file.
fn log_level(cli: &Cli) -> String {
    if cli.verbose {
        return "debug".to_string();
    }
    Config::load(config::config_path(&cli.base_dir))
        .map(|config| config.logging.level)
        .unwrap_or_else(|_| "info".to_string())
}

/// Initialize logging at the given default level; `RUST_LOG` still wins.
fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn open_context(base_dir: &std::path::Path) -> Result<Context> {
    let config = config::load_all(base_dir)?;
    Context::from_config(config, base_dir)
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&log_level(&cli));

    log::info!("base-crawler starting...");

    match cli.command {
        Command::Static { force } => {
            let ctx = open_context(&cli.base_dir)?;
            pipeline::run_static(&ctx, force).await?;
        }

        Command::Sync { kinds, args } => {
            let ctx = open_context(&cli.base_dir)?;
            let kinds = if kinds.is_empty() {
                RecordKind::ALL.to_vec()
            } else {
                kinds
            };
            let reports = pipeline::run_sync(&ctx, &kinds, &args.options(&ctx.config.sync)).await?;
            log::info!(
                "Sync complete: {} changes",
                reports.iter().map(|r| r.change_count()).sum::<usize>()
            );
        }

        Command::Cache {
            all,
            entities,
            stale_only,
            categories,
            analysis,
        } => {
            let scope = if stale_only {
                RecomputeScope::Stale
            } else {
                RecomputeScope::All
            };
            let targets = if all {
                RecomputeTargets::all(scope)
            } else {
                RecomputeTargets {
                    entities: (entities || stale_only).then_some(scope),
                    categories,
                    analyses: analysis.is_some(),
                    analysis_names: analysis.unwrap_or_default(),
                }
            };
            if targets == RecomputeTargets::default() {
                return Err(AppError::config(
                    "Nothing to recompute; pass --all, --entities, --categories or --analysis",
                ));
            }

            let ctx = open_context(&cli.base_dir)?;
            pipeline::run_recompute(&ctx, &targets).await?;
        }

        Command::Pipeline { args, force_static } => {
            let ctx = open_context(&cli.base_dir)?;
            let options = PipelineOptions {
                sync: args.options(&ctx.config.sync),
                force_static,
            };
            pipeline::run_pipeline(&ctx, &options).await?;
        }

        Command::Validate => {
            pipeline::run_validate(&cli.base_dir)?;
            log::info!("All validations passed!");
        }

        Command::Info => {
            let ctx = open_context(&cli.base_dir)?;
            log::info!("Base directory: {}", cli.base_dir.display());

            for kind in RecordKind::ALL {
                log::info!(
                    "{}: {} stored, last id {}",
                    kind.endpoint(),
                    ctx.store.count(kind)?,
                    ctx.store.max_base_id(kind)?.unwrap_or(0)
                );
            }
            log::info!("Stale entity aggregates: {}", ctx.store.entity_ids(true)?.len());
            for table in LookupTable::ALL {
                log::info!("{}: {} rows", table.table(), ctx.store.lookup_count(table)?);
            }
            log::info!(
                "Analyses: {}",
                AnalysisCache::with_defaults(&ctx).names().join(", ")
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
