use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Variable holding the log filter, e.g. `CHATBOT_LOG=chatbot_core=debug`.
pub const LOG_ENV: &str = "CHATBOT_LOG";

/// Send tracing output to a file so it never draws over the terminal UI.
///
/// Returns the log path, or `None` when there is no cache directory.
pub fn init() -> Result<Option<PathBuf>> {
    let Some(cache_dir) = dirs::cache_dir() else {
        return Ok(None);
    };
    let log_dir = cache_dir.join("chatbot");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("chatbot.log");

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(Some(log_path))
}
