//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::CONFIG_FILE;

/// Build, converge and diff declarative component trees
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: stackdom.toml)
    #[arg(short = 'C', long, default_value = CONFIG_FILE, value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build a serialized tree and print the result
    #[command(visible_alias = "b")]
    Build {
        /// Tree markup to build
        #[arg(value_hint = clap::ValueHint::FilePath)]
        input: PathBuf,

        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Build two serialized trees and report what changed between them
    #[command(visible_alias = "d")]
    Diff {
        /// Tree before the change
        #[arg(value_hint = clap::ValueHint::FilePath)]
        old: PathBuf,

        /// Tree after the change
        #[arg(value_hint = clap::ValueHint::FilePath)]
        new: PathBuf,

        /// Exit with an error when the trees differ
        #[arg(long)]
        check: bool,

        #[command(flatten)]
        build_args: BuildArgs,
    },
}

/// Shared build arguments for Build and Diff commands
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// State file read before the build (written back by `build`)
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    pub state: Option<PathBuf>,

    /// Number of expansions allowed along any path
    #[arg(short, long)]
    pub depth: Option<usize>,

    /// Expand only the outermost components (same as --depth 1)
    #[arg(long)]
    pub shallow: bool,

    /// Emit component URNs and lifecycle blocks
    #[arg(short, long)]
    pub reanimateable: bool,

    /// Spaces per indentation level (0 = single line)
    #[arg(long)]
    pub indent: Option<usize>,
}

impl Cli {
    pub fn build_args(&self) -> &BuildArgs {
        match &self.command {
            Commands::Build { build_args, .. } | Commands::Diff { build_args, .. } => build_args,
        }
    }
}
