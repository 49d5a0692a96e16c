use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use crossterm::terminal;
use tracing::{debug, info, instrument};

use crate::calendar::{self, DayRecord};
use crate::cli::Command;
use crate::config::Config;
use crate::layout;
use crate::render::{self, Renderer};
use crate::server;
use crate::watch;

#[instrument(skip(cfg, renderer, command))]
pub fn dispatch(cfg: &Config, renderer: &Renderer, command: Command) -> anyhow::Result<()> {
    // One clock read per invocation; everything below takes `now` as
    // an argument.
    let now = Utc::now();
    debug!(?command, "dispatching command");

    match command {
        Command::Show { width, height } => cmd_show(cfg, renderer, width, height, now),
        Command::Days { json } => cmd_days(cfg, json, now),
        Command::Svg { width, height, out } => {
            cmd_svg(cfg, renderer, width, height, out.as_deref(), now)
        }
        Command::Serve { addr } => cmd_serve(cfg.clone(), addr),
        Command::Watch => cmd_watch(cfg, renderer, now),
        Command::Config => cmd_config(cfg),
    }
}

fn enumerate(cfg: &Config, now: DateTime<Utc>) -> anyhow::Result<Vec<DayRecord>> {
    let days = calendar::enumerate_days(cfg.start_date, cfg.end_date, &cfg.timezone, now)
        .context("failed to enumerate days")?;
    Ok(days)
}

#[instrument(skip(cfg, renderer, now))]
fn cmd_show(
    cfg: &Config,
    renderer: &Renderer,
    width: Option<u16>,
    height: Option<u16>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let days = enumerate(cfg, now)?;

    let (detected_cols, detected_rows) = terminal::size().unwrap_or((80, 24));
    let cols = width.unwrap_or(detected_cols);
    let rows = height.unwrap_or(detected_rows);

    let grid = render::terminal_grid(days.len(), cols, rows)?;
    info!(
        days = days.len(),
        columns = grid.columns,
        rows = grid.rows,
        "rendering grid"
    );

    print!("{}", renderer.render_terminal(&days, &grid));

    let past = days.iter().filter(|day| day.is_past).count();
    println!("{past} of {} days past", days.len());
    Ok(())
}

#[instrument(skip(cfg, now))]
fn cmd_days(cfg: &Config, json: bool, now: DateTime<Utc>) -> anyhow::Result<()> {
    let days = enumerate(cfg, now)?;

    if json {
        let encoded = serde_json::to_string_pretty(&days).context("failed to encode days")?;
        println!("{encoded}");
        return Ok(());
    }

    for day in &days {
        if day.is_past {
            println!("{} past", day.date.format("%Y-%m-%d"));
        } else {
            println!("{}", day.date.format("%Y-%m-%d"));
        }
    }
    Ok(())
}

#[instrument(skip(cfg, renderer, now))]
fn cmd_svg(
    cfg: &Config,
    renderer: &Renderer,
    width: f64,
    height: f64,
    out: Option<&Path>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let days = enumerate(cfg, now)?;
    let grid = layout::solve_layout(
        days.len(),
        (width - cfg.padding).max(1.0),
        (height - cfg.padding).max(1.0),
    )?;
    let svg = renderer.render_svg(&days, &grid);

    match out {
        Some(path) => {
            fs::write(path, svg)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(file = %path.display(), "wrote SVG");
        }
        None => print!("{svg}"),
    }
    Ok(())
}

#[instrument(skip(cfg))]
fn cmd_serve(cfg: Config, addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    runtime.block_on(server::serve(cfg, addr))
}

#[instrument(skip(cfg, renderer, now))]
fn cmd_watch(cfg: &Config, renderer: &Renderer, now: DateTime<Utc>) -> anyhow::Result<()> {
    let days = enumerate(cfg, now)?;
    watch::watch(cfg, renderer, &days)
}

fn cmd_config(cfg: &Config) -> anyhow::Result<()> {
    let rendered = toml::to_string_pretty(cfg).context("failed to encode configuration")?;
    print!("{rendered}");
    Ok(())
}
