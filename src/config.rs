use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

pub const APP_ID: &str = "quotedesk";

/// Shown in place of the assistant's reply whenever the backend call fails.
pub const FALLBACK_REPLY: &str = "Error contacting the AI. Please try again.";

/// Transcript line recorded for the opening message instead of the full text.
pub const OPENING_TRANSCRIPT: &str = "I'd like to discuss a quote...";

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

pub const MAP_ZOOM: u8 = 15;
pub const MARKER_TITLE: &str = "Your Location";

pub fn opening_message(email: &str) -> String {
    format!(
        "I'd like to discuss a quote for boat transport. My email is {}.",
        email
    )
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub assistant_url: String,
    pub assistant_key: Option<String>,
    pub db_path: PathBuf,
    pub request_timeout: Duration,
}

impl AppConfig {
    pub fn new(
        assistant_url: String,
        assistant_key: Option<String>,
        db_path: Option<PathBuf>,
        timeout_secs: Option<u64>,
    ) -> Result<Self> {
        let db_path = match db_path {
            Some(path) => path,
            None => default_db_path()?,
        };
        Ok(Self {
            assistant_url,
            assistant_key: assistant_key.filter(|k| !k.is_empty()),
            db_path,
            request_timeout: Duration::from_secs(timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
        })
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    let data_dir = match std::env::var("XDG_DATA_HOME") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let home = std::env::var("HOME").context("Neither XDG_DATA_HOME nor HOME is set")?;
            PathBuf::from(home).join(".local/share")
        }
    };
    Ok(data_dir.join(APP_ID).join(format!("{}.db", APP_ID)))
}
