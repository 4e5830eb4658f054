//! Command-line interface module.

mod args;
pub mod build;
pub mod diff;

pub use args::{BuildArgs, Cli, Commands};
