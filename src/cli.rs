//! Command-line interface for the Parca operator.
use std::{path::PathBuf, str::FromStr};

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::event::Event;

/// Verbosity given to `--log-level`: a level name or a number from 0 (off)
/// to 5 (trace).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevelArg(LevelFilter);

impl LogLevelArg {
    pub fn filter(self) -> LevelFilter {
        self.0
    }
}

impl FromStr for LogLevelArg {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        // `LevelFilter` maps an empty string to ERROR; treat it as a typo instead.
        if value.is_empty() {
            return Err("log level cannot be empty".into());
        }
        if value.eq_ignore_ascii_case("warning") {
            return Ok(Self(LevelFilter::WARN));
        }

        value.parse::<LevelFilter>().map(Self).map_err(|_| {
            format!("invalid log level '{value}' (expected a level name or 0-5)")
        })
    }
}

/// Command-line interface for the Parca operator.
#[derive(Parser)]
#[command(name = "parca-operator", version, author)]
#[command(about = "Installs, configures and runs Parca on a Juju unit", long_about = None)]
pub struct Cli {
    /// Override the logging verbosity for this invocation only.
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Path to the operator settings file (defaults to `parca-operator.yaml` if present).
    #[arg(long, value_name = "PATH", global = true)]
    pub settings: Option<String>,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for the operator.
#[derive(Subcommand)]
pub enum Commands {
    /// Handle the hook Juju is currently running.
    Dispatch {
        /// Hook name; falls back to `JUJU_DISPATCH_PATH`, then `JUJU_HOOK_NAME`.
        #[arg(long)]
        hook: Option<String>,

        /// Dispatch path set by Juju, e.g. `hooks/install`.
        #[arg(long, env = "JUJU_DISPATCH_PATH", hide_env_values = true)]
        dispatch_path: Option<String>,

        /// Hook name set by older Juju agents.
        #[arg(long, env = "JUJU_HOOK_NAME", hide_env_values = true)]
        hook_name: Option<String>,
    },

    /// Feed a sequence of events through the reconciler in order.
    Replay {
        /// Events to handle, e.g. `install start config-changed`.
        #[arg(required = true, value_parser = parse_event)]
        events: Vec<Event>,
    },

    /// Print the Parca configuration and command line `configure` would produce.
    Render {
        /// JSON file with a list of scrape jobs.
        #[arg(short, long)]
        jobs: Option<PathBuf>,

        /// JSON file with the charm config.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

impl Commands {
    /// Resolves the hook name for `dispatch`, preferring the explicit flag.
    pub fn hook(&self) -> Option<&str> {
        match self {
            Commands::Dispatch {
                hook,
                dispatch_path,
                hook_name,
            } => hook
                .as_deref()
                .or(dispatch_path.as_deref().map(Event::hook_name))
                .or(hook_name.as_deref())
                .filter(|name| !name.is_empty()),
            _ => None,
        }
    }
}

fn parse_event(value: &str) -> Result<Event, String> {
    Event::parse(value).map_err(|err| err.to_string())
}

/// Parses command-line arguments and returns a `Cli` struct.
pub fn parse_args() -> Cli {
    Cli::parse()
}
