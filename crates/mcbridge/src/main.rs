mod bootstrap_helpers;
mod bridge_runtime;
mod startup_config;

use anyhow::Result;
use clap::Parser;
use mcbridge_cli::Cli;

use crate::bootstrap_helpers::init_tracing;
use crate::bridge_runtime::run_bridge;
use crate::startup_config::{compile_settings, render_check_config_report};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let compiled = compile_settings(&cli.settings)?;
    if cli.check_config {
        println!("{}", render_check_config_report(&cli.settings, &compiled));
        return Ok(());
    }
    run_bridge(&cli, compiled).await
}
