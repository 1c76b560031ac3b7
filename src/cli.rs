use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Transport quote chat backed by an assistant relay.
#[derive(Parser, Debug)]
#[command(name = "quotedesk", version, about)]
pub struct CliArgs {
    /// SQLite database holding conversation records.
    #[arg(long = "db", env = "QUOTEDESK_DB", global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start a quote conversation and chat from stdin.
    Quote {
        /// Contact email sent with the opening message.
        #[arg(short, long)]
        email: String,

        /// Signed-in member id; omit to chat as a guest.
        #[arg(short, long)]
        member: Option<String>,

        #[arg(long = "assistant-url", env = "QUOTEDESK_ASSISTANT_URL")]
        assistant_url: String,

        #[arg(long = "assistant-key", env = "QUOTEDESK_ASSISTANT_KEY", hide_env_values = true)]
        assistant_key: Option<String>,

        /// HTTP timeout for assistant calls, in seconds.
        #[arg(long = "timeout", env = "QUOTEDESK_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
    },
    /// Print the map view for a position.
    Map {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lng: f64,

        #[arg(long = "maps-key", env = "QUOTEDESK_MAPS_KEY", hide_env_values = true)]
        maps_key: Option<String>,
    },
}
