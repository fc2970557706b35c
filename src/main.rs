use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lead_scoring::logging::init_logging;
use lead_scoring::store::{SqliteTableStore, StoreStatus, TableStore};
use lead_scoring::validation::SchemaCheck;
use lead_scoring::{Pipeline, PipelineConfig, PipelineMode, Stage};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "lead-scoring")]
#[command(about = "Lead scoring data pipeline: raw leads to model-ready features")]
struct Args {
    /// Pipeline configuration file (JSON); defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the table store if it does not exist
    InitStore,
    /// Check the raw lead file's columns
    ValidateRaw {
        /// Raw file to check instead of the configured one
        file: Option<PathBuf>,
    },
    /// Run every stage in order
    Run {
        #[arg(long)]
        mode: Option<PipelineMode>,

        /// Write the run report as JSON to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Run a single stage against the current store contents
    Stage {
        #[arg(value_enum)]
        stage: StageArg,

        #[arg(long)]
        mode: Option<PipelineMode>,
    },
    /// Check the stored model_input table's columns
    ValidateModelInput {
        #[arg(long)]
        mode: Option<PipelineMode>,
    },
    /// One-hot encode model_input into the features table
    Encode,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Load,
    CityTier,
    CategoricalCollapse,
    InteractionMapping,
}

impl From<StageArg> for Stage {
    fn from(arg: StageArg) -> Self {
        match arg {
            StageArg::Load => Stage::Load,
            StageArg::CityTier => Stage::CityTier,
            StageArg::CategoricalCollapse => Stage::CategoricalCollapse,
            StageArg::InteractionMapping => Stage::InteractionMapping,
        }
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = PipelineConfig::load(args.config.as_deref())
        .context("Failed to load pipeline configuration")?;
    if let Some(mode) = mode_override(&args.command) {
        config.mode = mode;
    }

    let store = SqliteTableStore::new(config.db_file());

    match args.command {
        Commands::InitStore => {
            match store.ensure_exists()? {
                StoreStatus::Created => info!("Created table store at {}", store.db_path().display()),
                StoreStatus::AlreadyExists => {
                    info!("Table store already exists at {}", store.db_path().display())
                }
            }
            Ok(())
        }
        Commands::ValidateRaw { file } => {
            let mut config = config;
            if let Some(file) = file {
                config.data_directory = file.parent().map(PathBuf::from).unwrap_or_default();
                config.data_file_name = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
            }
            let pipeline = Pipeline::from_config(&store, config)?;
            report_check(pipeline.validate_raw()?);
            Ok(())
        }
        Commands::Run { report, .. } => {
            let pipeline = Pipeline::from_config(&store, config)?;
            let run = pipeline.run().map_err(|e| {
                error!("Pipeline run failed: {}", e);
                e
            })?;
            let json = run.to_json()?;
            match report {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write report to {}", path.display()))?;
                    info!("Run report written to {}", path.display());
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Commands::Stage { stage, .. } => {
            let pipeline = Pipeline::from_config(&store, config)?;
            let report = pipeline.run_stage(stage.into())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::ValidateModelInput { .. } => {
            let pipeline = Pipeline::from_config(&store, config)?;
            report_check(pipeline.validate_model_input()?);
            Ok(())
        }
        Commands::Encode => {
            let pipeline = Pipeline::from_config(&store, config)?;
            let (report, check) = pipeline.encode()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            report_check(check);
            Ok(())
        }
    }
}

fn mode_override(command: &Commands) -> Option<PipelineMode> {
    match command {
        Commands::Run { mode, .. }
        | Commands::Stage { mode, .. }
        | Commands::ValidateModelInput { mode } => *mode,
        _ => None,
    }
}

fn report_check(check: SchemaCheck) {
    println!("{}", serde_json::to_string(&check).unwrap_or_else(|_| format!("{:?}", check)));
}
