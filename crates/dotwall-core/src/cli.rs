use std::io::IsTerminal;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "dotwall",
    version,
    about = "Render a span of days as a grid of dots",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(
        long = "set",
        value_name = "KEY=VALUE",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub overrides: Vec<KeyVal>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render the grid once to the terminal
    Show {
        /// Terminal columns to lay out for (detected when omitted)
        #[arg(long)]
        width: Option<u16>,

        /// Terminal rows to lay out for (detected when omitted)
        #[arg(long)]
        height: Option<u16>,
    },

    /// List the enumerated days
    Days {
        #[arg(long)]
        json: bool,
    },

    /// Write the grid as an SVG document
    Svg {
        /// Target area width in pixels
        #[arg(long, default_value_t = 800.0)]
        width: f64,

        /// Target area height in pixels
        #[arg(long, default_value_t = 600.0)]
        height: f64,

        /// Output file (stdout when omitted)
        #[arg(short = 'o', long = "out")]
        out: Option<PathBuf>,
    },

    /// Serve the grid page and its assets over HTTP
    Serve {
        /// Socket address to listen on (overrides the config)
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Keep redrawing the grid as the terminal resizes
    Watch,

    /// Print the effective configuration
    Config,
}

impl Default for Command {
    fn default() -> Self {
        Self::Show {
            width: None,
            height: None,
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
