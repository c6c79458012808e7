//! Offline runner for the post-auction bid pipeline.
//!
//! This tool provides commands for:
//! - Running an auction fixture through floors, advertiser blocking,
//!   trackers and creative injection
//! - Validating settings files and printing the effective configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod error;
mod process;

use error::CliError;

#[derive(Parser)]
#[command(name = "rtbx")]
#[command(about = "Run recorded auctions through the post-auction pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Process an auction fixture and print the result as JSON
    Process {
        /// Path to the TOML settings file
        #[arg(long, short, env = "RTBX_SETTINGS")]
        settings: PathBuf,

        /// Path to the auction fixture (JSON)
        #[arg(long, short)]
        input: PathBuf,

        /// Write the result here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Seed for floor sampling, for reproducible runs
        #[arg(long)]
        seed: Option<u64>,

        /// Keep every surviving bid instead of the best one per impression
        #[arg(long)]
        all_bids: bool,
    },

    /// Validate settings and print the effective TOML
    Validate {
        /// Path to the TOML settings file
        #[arg(long, short, env = "RTBX_SETTINGS")]
        settings: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Process {
            settings,
            input,
            output,
            seed,
            all_bids,
        } => process::run(&process::ProcessArgs {
            settings,
            input,
            output,
            seed,
            all_bids,
        }),
        Commands::Validate { settings } => process::validate(&settings),
    }
}

fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };

    let applied = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply();

    if let Err(e) = applied {
        eprintln!("Failed to initialize logger: {}", e);
    }
}
