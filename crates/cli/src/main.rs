//! VM insight CLI
//!
//! Runs the telemetry pipeline on local files and queries a running
//! insight server for recommendations and alerts.

mod client;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use commands::{alerts, pipeline, recommend};
use insight_lib::{
    alerts::ImpactLevel,
    split::{SplitStrategy, DEFAULT_SEED, DEFAULT_TEST_SIZE},
};
use tracing_subscriber::EnvFilter;

/// VM insight CLI
#[derive(Parser)]
#[command(name = "vmi")]
#[command(author, version, about = "CLI for VM telemetry insight", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via VMI_API_URL env var)
    #[arg(long, env = "VMI_API_URL")]
    pub api_url: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate raw telemetry into the per-day, per-instance table
    Preprocess {
        /// Raw telemetry CSV
        #[arg(long, short)]
        input: PathBuf,

        /// Also write the aggregate table to this path
        #[arg(long, short)]
        snapshot: Option<PathBuf>,
    },

    /// Run the full analysis report
    #[command(group(ArgGroup::new("source").required(true).args(["input", "snapshot"])))]
    Analyze {
        /// Raw telemetry CSV
        #[arg(long, short)]
        input: Option<PathBuf>,

        /// Previously written aggregate table
        #[arg(long, short)]
        snapshot: Option<PathBuf>,
    },

    /// Split an aggregate table into train and test files
    Split {
        /// Aggregate table to split
        #[arg(long, short)]
        snapshot: PathBuf,

        /// Fraction of records held out for testing
        #[arg(long, default_value_t = DEFAULT_TEST_SIZE)]
        test_size: f64,

        /// Partitioning strategy
        #[arg(long, value_enum, default_value = "time")]
        strategy: StrategyArg,

        /// Shuffle seed for the random strategy
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Directory receiving train/ and test/
        #[arg(long, short)]
        out_dir: PathBuf,
    },

    /// Get optimization recommendations from the server
    Recommend,

    /// Show operational alerts
    Alerts {
        /// Filter by impact level
        #[arg(long, value_enum)]
        impact: Option<ImpactArg>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Time,
    Random,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ImpactArg {
    High,
    Medium,
    Low,
}

impl From<ImpactArg> for ImpactLevel {
    fn from(arg: ImpactArg) -> Self {
        match arg {
            ImpactArg::High => ImpactLevel::High,
            ImpactArg::Medium => ImpactLevel::Medium,
            ImpactArg::Low => ImpactLevel::Low,
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file_config = config::Config::load()?;
    let format = file_config.resolve_format(cli.format)?;

    match cli.command {
        Commands::Preprocess { input, snapshot } => {
            pipeline::preprocess(&input, snapshot.as_deref(), format)?;
        }
        Commands::Analyze { input, snapshot } => {
            pipeline::analyze_command(input.as_deref(), snapshot.as_deref(), format)?;
        }
        Commands::Split {
            snapshot,
            test_size,
            strategy,
            seed,
            out_dir,
        } => {
            let strategy = match strategy {
                StrategyArg::Time => SplitStrategy::Time,
                StrategyArg::Random => SplitStrategy::Random { seed },
            };
            pipeline::split(&snapshot, test_size, strategy, &out_dir, format)?;
        }
        Commands::Recommend => {
            let client = client::ApiClient::new(&file_config.resolve_api_url(cli.api_url))?;
            recommend::recommend(&client, format).await?;
        }
        Commands::Alerts { impact } => {
            let client = client::ApiClient::new(&file_config.resolve_api_url(cli.api_url))?;
            alerts::alerts(&client, impact.map(ImpactLevel::from), format).await?;
        }
    }

    Ok(())
}
