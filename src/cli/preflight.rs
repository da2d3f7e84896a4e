//! Pre-flight checks before any stage runs.
//!
//! Validates that the credential and external tools are available so a batch
//! does not fail midway on something that was missing from the start.

use crate::config::Settings;
use crate::error::{Result, VidnotesError};
use std::process::Command;

/// Run all pre-flight checks and return the notes API credential.
pub fn check(settings: &Settings) -> Result<String> {
    let api_key = settings.api_key()?;
    check_tool(&settings.extraction.ffmpeg_path, "-version")?;
    check_tool(&settings.transcription.whisper_path, "--help")?;
    Ok(api_key)
}

/// Check if an external tool is available.
fn check_tool(name: &str, probe_arg: &str) -> Result<()> {
    match Command::new(name).arg(probe_arg).output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(VidnotesError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(VidnotesError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(VidnotesError::ToolNotFound(format!("{}: {}", name, e))),
    }
}
