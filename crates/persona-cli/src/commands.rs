//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind, overrides PERSONA_BIND
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Profile one fingerprint record read from a JSON file
    Profile {
        /// Path to the fingerprint JSON
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Simulate one ad auction
    Auction {
        /// Human-readable profile summary
        #[arg(short, long)]
        summary: String,

        /// Country name
        #[arg(long, default_value = "")]
        country: String,

        /// Two-letter country code
        #[arg(long)]
        country_code: String,
    },

    /// Unique visitor tracking
    Visitors {
        #[command(subcommand)]
        command: VisitorCommands,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum VisitorCommands {
    /// Record a visit and report whether the visitor is new
    Record {
        /// Visitor identifier
        visitor_id: String,
    },
    /// Print the number of unique visitors
    Count,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration with credentials masked
    Show,
}
