//! Reelsmith CLI — render short videos from prepared render requests.
//!
//! Usage:
//!   reelsmith render <REQUEST>        Render one request to video
//!   reelsmith batch <REQUEST>...      Render many requests concurrently
//!   reelsmith plan <REQUEST>          Show the schedule without rendering
//!   reelsmith validate <REQUEST>      Check a request and its source files
//!   reelsmith check                   Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reelsmith_common::config::AppConfig;

mod commands;

use commands::RenderOptions;

#[derive(Parser)]
#[command(
    name = "reelsmith",
    about = "Compose narrated short videos with animated captions",
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
    /// Render one request to a video file
    Render {
        /// Path to the render request JSON
        request: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: RenderOptions,
    },

    /// Render several requests as one batch
    Batch {
        /// Paths to render request JSON files
        #[arg(required = true)]
        requests: Vec<PathBuf>,

        /// Jobs allowed to run at once (defaults to the configured pool size)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        options: RenderOptions,
    },

    /// Print the timeline schedule and caption statistics
    Plan {
        /// Path to the render request JSON
        request: PathBuf,

        /// Narration length to fit to, instead of probing the file
        #[arg(long)]
        narration_secs: Option<f64>,

        /// Print the schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate a request and report missing source files
    Validate {
        /// Path to the render request JSON
        request: PathBuf,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    reelsmith_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Render {
            request,
            output,
            options,
        } => commands::render::run(&config, request, output, &options).await,
        Commands::Batch {
            requests,
            jobs,
            options,
        } => commands::batch::run(&config, requests, jobs, &options).await,
        Commands::Plan {
            request,
            narration_secs,
            json,
        } => commands::plan::run(&config, request, narration_secs, json),
        Commands::Validate { request } => commands::validate::run(request),
        Commands::Check => commands::check::run(&config),
    }
}
