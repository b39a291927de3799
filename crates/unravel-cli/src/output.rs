//! Attribution rendering: human text or stable JSON.

use anyhow::Result;
use std::io::Write;
use unravel_core::Attribution;

/// The two output modes supported by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable lines.
    Human,
    /// Machine-readable JSON, one object per attribution.
    Json,
}

/// Write one attribution in the requested mode.
///
/// # Errors
///
/// Returns an error if the write fails or JSON serialization fails.
pub fn render(w: &mut dyn Write, mode: OutputMode, attribution: &Attribution) -> Result<()> {
    match mode {
        OutputMode::Json => {
            serde_json::to_writer(&mut *w, attribution)?;
            writeln!(w)?;
        }
        OutputMode::Human => {
            writeln!(
                w,
                "match: {} <{}>",
                attribution.user.name, attribution.user.email
            )?;
            match &attribution.change {
                Some(change) => {
                    writeln!(
                        w,
                        "  post {}: {} at {}",
                        change.cid, change.diff_type, change.time
                    )?;
                    if let Some(content) = &change.content {
                        writeln!(w, "  content: {content}")?;
                    }
                }
                None => writeln!(w, "  (no post-level change pinned down)")?,
            }
        }
    }
    Ok(())
}
