// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mtadeploy")]
#[command(about = "Blue-green deployment of multi-module applications")]
#[command(version)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (default: discovered in the current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new mtadeploy.yml configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(short, long)]
        force: bool,
    },

    /// Deploy the MTA archive named in the configuration
    Deploy {
        /// Break a lock left behind by another run
        #[arg(short, long)]
        force: bool,
    },

    /// Restore the backup MTA as the deployed one
    Rollback {
        /// Break a lock left behind by another run
        #[arg(short, long)]
        force: bool,
    },

    /// Print the content digest of one module of an MTA archive
    Digest {
        /// MTA archive (tar)
        archive: PathBuf,

        /// Module entry inside the archive, file or directory
        entry: String,

        /// Largest accepted file inside the entry, in bytes
        #[arg(long, default_value_t = default_max_size())]
        max_size: u64,
    },
}

fn default_max_size() -> u64 {
    mtadeploy::config::UploadConfig::default().max_resource_size
}
