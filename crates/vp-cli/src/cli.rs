//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Voice channel presence reports.
///
/// Rebuilds presence sessions from voice channel join/leave rows and reports
/// how long each member was present during the daily window.
#[derive(Debug, Parser)]
#[command(name = "vp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import voice channel events from JSONL.
    Import {
        /// Read events from this file instead of stdin.
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Compute and print presence totals for a day.
    Report {
        #[command(flatten)]
        day: DayArgs,

        /// Output the delivered JSON records.
        #[arg(long)]
        json: bool,

        /// Also list the sessions that survived nested-session removal.
        #[arg(long, conflicts_with = "json")]
        sessions: bool,
    },

    /// Compute presence totals for a day and deliver them to the API.
    Push {
        #[command(flatten)]
        day: DayArgs,
    },
}

/// Selection of the reported day and scope.
#[derive(Debug, Clone, Args)]
pub struct DayArgs {
    /// Report date (YYYY-MM-DD, UTC).
    #[arg(long, conflicts_with = "days_ago")]
    pub date: Option<String>,

    /// Report the UTC day this many days before today.
    #[arg(long)]
    pub days_ago: Option<u32>,

    /// Only include events from this clan (overrides config).
    #[arg(long)]
    pub clan: Option<i64>,
}
