//! CLI binary entry point for lakehouse-ingest

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use lakehouse_ingest::cli::commands::config::{handle_config_sample, handle_config_show};
#[cfg(feature = "cli")]
use lakehouse_ingest::cli::commands::inspect::{handle_detect, handle_key};
#[cfg(feature = "cli")]
use lakehouse_ingest::cli::commands::run::{RunArgs, handle_run};
#[cfg(feature = "cli")]
use lakehouse_ingest::inference::DEFAULT_MIN_PARSE_RATIO;
#[cfg(feature = "cli")]
use lakehouse_ingest::logging::{LogConfig, init_logging};
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "lakehouse-ingest")]
#[command(about = "Ingest raw tabular files into date-partitioned Parquet datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Process an S3 event notification
    Run {
        /// Event JSON file or '-' for stdin
        #[arg(short, long, default_value = "-")]
        event: String,
        /// Config file (defaults to .ingest.toml in the working directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Local directory used as the object store; bucket names become subdirectories
        #[arg(short, long)]
        root: Option<PathBuf>,
        /// Iceberg catalog definition (TOML). Uses an in-memory catalog when absent.
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// Pretty-print the JSON result
        #[arg(short, long)]
        pretty: bool,
    },
    /// Show the namespace and table an object key resolves to
    Key {
        /// Object key, form-encoded as in event notifications
        key: String,
        /// Leading segment to strip before resolving
        #[arg(long)]
        prefix: Option<String>,
    },
    /// List date column candidates of a local CSV or Parquet file
    Detect {
        /// Input file
        file: PathBuf,
        /// Share of sampled values that must parse as dates
        #[arg(long, default_value_t = DEFAULT_MIN_PARSE_RATIO)]
        min_parse_ratio: f64,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a sample configuration file
    Sample,
    /// Print the effective configuration
    Show {
        /// Directory containing .ingest.toml
        #[arg(short, long)]
        dir: Option<PathBuf>,
        /// Explicit config file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_config = match LogConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    let result = match cli.command {
        Commands::Run {
            event,
            config,
            root,
            catalog,
            pretty,
        } => {
            let args = RunArgs {
                event,
                config,
                root,
                catalog,
                pretty,
            };
            handle_run(&args).await
        }
        Commands::Key { key, prefix } => handle_key(&key, prefix),
        Commands::Detect {
            file,
            min_parse_ratio,
        } => handle_detect(file, min_parse_ratio),
        Commands::Config { command } => match command {
            ConfigCommands::Sample => handle_config_sample(),
            ConfigCommands::Show { dir, file } => handle_config_show(dir, file),
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
