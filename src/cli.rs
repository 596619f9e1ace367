use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "evermedia")]
#[command(author, version, about = "Probe and cache media info for link files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline for one or more link files
    Process {
        /// Link files to process
        #[arg(required = true)]
        links: Vec<PathBuf>,
    },

    /// Dispatch every link file under a directory and wait for the runs
    Scan {
        /// Directory to scan
        #[arg(required = true)]
        dir: PathBuf,
    },

    /// Watch configured directories and process link files as they change
    Watch,

    /// Print the cached sidecar for a link file
    Show {
        /// Link file
        #[arg(required = true)]
        link: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}
