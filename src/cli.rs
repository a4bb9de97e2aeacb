//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::config::BuildMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Extract, rewrite and cache GROQ queries embedded in site sources
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root directory
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Source directory path (relative to project root)
    #[arg(short, long)]
    pub src: Option<PathBuf>,

    /// Config file name (default: groq.toml)
    #[arg(short = 'C', long, default_value = "groq.toml")]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Shared arguments for Build and Watch commands
#[derive(clap::Args, Debug, Clone)]
pub struct BuildArgs {
    /// Build mode, selects the cache root
    #[arg(short, long, value_enum)]
    pub mode: Option<BuildMode>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Clear the cache, extract every query and apply page queries to registered pages
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build, then re-extract queries whenever a source file changes
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Print the cached result for a static query, keyed the way render code looks it up
    Lookup {
        /// Query text exactly as written at the call site
        query: String,

        #[command(flatten)]
        build_args: BuildArgs,
    },
}

impl Cli {
    pub const fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args }
            | Commands::Watch { build_args }
            | Commands::Lookup { build_args, .. } => build_args,
        }
    }

    pub const fn is_lookup(&self) -> bool {
        matches!(self.command, Commands::Lookup { .. })
    }
}
