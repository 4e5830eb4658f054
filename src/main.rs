//! Stackdom command-line entry point.

use anyhow::Result;
use clap::{ColorChoice, Parser};
use stackdom::{
    cli::{self, Cli, Commands},
    config::EngineConfig,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }

    let mut config = EngineConfig::load(&cli.config)?;
    config.apply_verbose(cli.verbose);
    config.apply_build_args(cli.build_args());

    match &cli.command {
        Commands::Build { input, build_args } => {
            cli::build::run_build(input, build_args.state.as_deref(), &config)
        }
        Commands::Diff {
            old,
            new,
            check,
            build_args,
        } => cli::diff::run_diff(old, new, *check, build_args.state.as_deref(), &config),
    }
}
