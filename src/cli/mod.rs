use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;
pub mod format;

#[derive(Parser, Debug)]
#[command(name = "ccpulse")]
#[command(about = "Claude Code usage metrics from Prometheus and local stats")]
#[command(version)]
pub struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the connection to the metrics backend
    Check,

    /// List metric names known to the backend
    Discover {
        /// Substring to match, case-insensitive
        #[arg(default_value = "claude_code")]
        patterns: Vec<String>,
    },

    /// Usage totals, breakdowns and rates for a time range
    Dashboard {
        /// Preset range: 15m, 1h, 12h, 1d, 1w, 2w, 30d, 90d
        #[arg(short, long, conflicts_with_all = ["start", "end"])]
        range: Option<String>,

        /// Custom range start (RFC 3339)
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Custom range end (RFC 3339)
        #[arg(long, requires = "start")]
        end: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Per-session cost, tokens and active time
    Sessions {
        #[arg(short, long)]
        range: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Trends, streaks and peaks from the local stats file
    Insights {
        /// Days per comparison period
        #[arg(short, long, default_value = "7")]
        days: u32,

        /// Stats file to read instead of the configured one
        #[arg(long)]
        file: Option<PathBuf>,

        /// Reference date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Health of the metrics backend itself
    Health {
        #[arg(short, long)]
        range: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Refresh the dashboard periodically until Ctrl-C
    Watch {
        #[arg(short, long)]
        range: Option<String>,

        /// Seconds between refreshes (defaults to the configured interval)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Serve the JSON API
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        /// Open the API in the browser
        #[arg(long)]
        open: bool,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Set the Prometheus base URL
    SetUrl { url: String },
}
