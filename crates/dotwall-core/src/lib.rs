pub mod assets;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod layout;
pub mod render;
pub mod server;
pub mod watch;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting dotwall"
    );

    let overrides = cli
        .overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
        .collect();
    let cfg = config::Config::load(cli.config.as_deref(), overrides)
        .context("failed to load configuration")?;
    debug!(?cfg, "effective configuration");

    let renderer = render::Renderer::new(&cfg);
    let command = cli.command.unwrap_or_default();

    commands::dispatch(&cfg, &renderer, command)?;

    info!("done");
    Ok(())
}
