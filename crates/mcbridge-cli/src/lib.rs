//! Command-line and environment configuration for the bridge binary.

pub mod cli_args;
pub mod validation;

pub use cli_args::Cli;
pub use validation::*;
