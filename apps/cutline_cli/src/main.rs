//! Cutline CLI: create projects, import media, inspect and play timelines.
//!
//! Usage:
//!   cutline new <PATH>                 Create an empty project
//!   cutline info <PATH>                Show tracks, clips and media
//!   cutline import <PATH> <MEDIA>...   Probe and register media files
//!   cutline at <PATH> <SECONDS>        List clips visible at a time
//!   cutline play <PATH>                Play the timeline

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "cutline", about = "Non-linear timeline engine", version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an empty project
    New {
        /// Project file path (".cutline" is appended when missing)
        path: PathBuf,

        /// Project name
        #[arg(short, long, default_value = "Untitled")]
        name: String,

        /// Settings preset: 1080p, 720p, 4k, shorts, 1080p60
        #[arg(long, default_value = "1080p")]
        preset: String,
    },

    /// Show project information
    Info {
        /// Project file path
        path: PathBuf,
    },

    /// Probe media files and add them to the project library
    Import {
        /// Project file path
        path: PathBuf,

        /// Media files to import
        #[arg(required = true)]
        media: Vec<PathBuf>,

        /// Also place each file on the timeline, back to back
        #[arg(long)]
        place: bool,

        /// Timeline position of the first placed clip (seconds)
        #[arg(long, default_value = "0")]
        at: f64,
    },

    /// List the clips visible at a timeline position
    At {
        /// Project file path
        path: PathBuf,

        /// Timeline position (seconds)
        seconds: f64,
    },

    /// Play the timeline until it ends
    Play {
        /// Project file path
        path: PathBuf,

        /// Start position (seconds)
        #[arg(long, default_value = "0")]
        from: f64,

        /// Stop after this many seconds of wall-clock time
        #[arg(long = "for")]
        limit: Option<f64>,

        /// Show video in an mpv window instead of logging frames
        #[arg(long)]
        mpv: bool,

        /// JSON file overriding playback tuning
        #[arg(long)]
        playback_config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    match cli.command {
        Commands::New { path, name, preset } => commands::new::run(path, name, preset),
        Commands::Info { path } => commands::info::run(path),
        Commands::Import {
            path,
            media,
            place,
            at,
        } => commands::import::run(path, media, place, at).await,
        Commands::At { path, seconds } => commands::at::run(path, seconds),
        Commands::Play {
            path,
            from,
            limit,
            mpv,
            playback_config,
        } => commands::play::run(path, from, limit, mpv, playback_config).await,
    }
}
