//! ClipMerge CLI: probe clips, plan merges, and export them.
//!
//! Usage:
//!   clipmerge probe <FILE>               Describe a media file
//!   clipmerge classify <A> <B> <C> <D>   Classify a display transform
//!   clipmerge plan --first F --second F  Build a merge plan
//!   clipmerge merge --first F --second F Merge two clips into a movie
//!   clipmerge info <PLAN>                Show and validate a saved plan
//!   clipmerge check                      Check system capabilities

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use clipmerge_common::config::{config_file_path, AppConfig};

mod commands;

#[derive(Parser)]
#[command(
    name = "clipmerge",
    about = "Merge two video clips into one movie, orientation-aware",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe a media file and print its clip descriptor
    Probe {
        /// Media file to probe
        path: PathBuf,

        /// Save the descriptor as JSON instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify a preferred transform's linear part
    Classify {
        #[arg(allow_hyphen_values = true)]
        a: f64,
        #[arg(allow_hyphen_values = true)]
        b: f64,
        #[arg(allow_hyphen_values = true)]
        c: f64,
        #[arg(allow_hyphen_values = true)]
        d: f64,
    },

    /// Build a merge plan from two clips and optional audio
    Plan {
        /// First clip (media file or descriptor .json)
        #[arg(long)]
        first: PathBuf,

        /// Second clip (media file or descriptor .json)
        #[arg(long)]
        second: PathBuf,

        /// Background audio (media file or descriptor .json)
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Canvas size as WIDTHxHEIGHT (defaults to the first clip's size)
        #[arg(long)]
        canvas: Option<String>,

        /// Output frame rate
        #[arg(long)]
        fps: Option<u32>,

        /// Save the plan as JSON instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge two clips and export the result
    Merge {
        /// First clip (media file or descriptor .json)
        #[arg(long)]
        first: PathBuf,

        /// Second clip (media file or descriptor .json)
        #[arg(long)]
        second: PathBuf,

        /// Background audio (media file or descriptor .json)
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Output movie path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show a saved merge plan and validate it
    Info {
        /// Path to the plan JSON
        path: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&config_file_path());
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    clipmerge_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Probe { path, output } => commands::probe::run(path, output),
        Commands::Classify { a, b, c, d } => commands::classify::run(a, b, c, d),
        Commands::Plan {
            first,
            second,
            audio,
            canvas,
            fps,
            output,
        } => commands::plan::run(&config, first, second, audio, canvas, fps, output),
        Commands::Merge {
            first,
            second,
            audio,
            output,
        } => commands::merge::run(&config, first, second, audio, output).await,
        Commands::Info { path } => commands::info::run(path),
        Commands::Check => commands::check::run(),
    }
}

/// Read the config file, falling back to defaults.
///
/// Runs before logging is set up, so a broken file is reported on stderr.
fn load_config(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }
    AppConfig::load_from(path).unwrap_or_else(|e| {
        eprintln!("Warning: ignoring config at {}: {e}", path.display());
        AppConfig::default()
    })
}
