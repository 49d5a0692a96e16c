use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::cursor::MoveTo;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::{execute, queue};
use tracing::{debug, warn};

use crate::calendar::DayRecord;
use crate::config::Config;
use crate::render::{self, Renderer};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Redraws the grid whenever the terminal is resized, with a
/// trailing-edge debounce: a newer resize cancels the pending redraw
/// and re-arms the delay. Any key press exits.
///
/// Day classification is fixed at entry; only the layout is recomputed
/// per resize.
pub fn watch(cfg: &Config, renderer: &Renderer, days: &[DayRecord]) -> anyhow::Result<()> {
    let debounce = Duration::from_millis(cfg.debounce_ms);

    terminal::enable_raw_mode().context("failed to enable raw terminal mode")?;
    let result = watch_loop(renderer, days, debounce);
    if let Err(err) = terminal::disable_raw_mode() {
        warn!(error = %err, "failed to restore terminal mode");
    }
    result
}

fn watch_loop(renderer: &Renderer, days: &[DayRecord], debounce: Duration) -> anyhow::Result<()> {
    let (cols, rows) = terminal::size().context("failed to query terminal size")?;
    draw(renderer, days, cols, rows)?;

    let mut pending: Option<(u16, u16)> = None;
    let mut deadline: Option<Instant> = None;

    loop {
        if event::poll(POLL_INTERVAL).context("failed to poll terminal events")? {
            match event::read().context("failed to read terminal event")? {
                Event::Resize(cols, rows) => {
                    debug!(cols, rows, "resize observed, arming redraw");
                    pending = Some((cols, rows));
                    deadline = Some(Instant::now() + debounce);
                }
                Event::Key(_) => break,
                _ => {}
            }
        }

        if let (Some((cols, rows)), Some(at)) = (pending, deadline)
            && Instant::now() >= at
        {
            pending = None;
            deadline = None;
            draw(renderer, days, cols, rows)?;
        }
    }

    Ok(())
}

fn draw(renderer: &Renderer, days: &[DayRecord], cols: u16, rows: u16) -> anyhow::Result<()> {
    let grid = render::terminal_grid(days.len(), cols, rows)?;
    let out = renderer.render_terminal(days, &grid);

    let mut stdout = io::stdout().lock();
    execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))
        .context("failed to clear terminal")?;

    // Raw mode needs explicit carriage returns.
    for line in out.lines() {
        queue!(stdout, crossterm::style::Print(line), crossterm::style::Print("\r\n"))
            .context("failed to queue output")?;
    }
    stdout.flush().context("failed to flush terminal")?;

    Ok(())
}
