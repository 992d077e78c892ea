use anyhow::{Context, Result};
use arboard::Clipboard;

/// Copies the given text to the system clipboard.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let mut clipboard = Clipboard::new().context("failed to initialize clipboard")?;
    clipboard
        .set_text(text)
        .context("failed to set clipboard text")?;
    tracing::debug!(chars = text.len(), "copied message to clipboard");
    Ok(())
}
