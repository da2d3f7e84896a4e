//! Audio extraction with ffmpeg.

use super::{Stage, StageRunner};
use crate::config::ExtractionSettings;
use crate::error::{Result, VidnotesError};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Extracts the audio track of a video into MP3.
pub struct FfmpegExtractor {
    ffmpeg: String,
}

impl FfmpegExtractor {
    pub fn new(settings: &ExtractionSettings) -> Self {
        Self {
            ffmpeg: settings.ffmpeg_path.clone(),
        }
    }
}

#[async_trait]
impl StageRunner for FfmpegExtractor {
    fn stage(&self) -> Stage {
        Stage::Extract
    }

    #[instrument(skip(self), fields(video = %input.display()))]
    async fn run(&self, input: &Path, output: &Path) -> Result<()> {
        if !input.is_file() {
            return Err(VidnotesError::Extraction(format!(
                "Video file not found: {}",
                input.display()
            )));
        }

        debug!("Extracting audio to {:?}", output);

        let result = Command::new(&self.ffmpeg)
            .arg("-i").arg(input)
            .arg("-vn")
            .arg("-codec:a").arg("libmp3lame")
            .arg("-qscale:a").arg("2")
            .arg("-y")
            .arg("-loglevel").arg("error")
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => {}
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                return Err(VidnotesError::Extraction(format!(
                    "ffmpeg could not decode {}: {}",
                    input.display(),
                    err.trim()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VidnotesError::ToolNotFound(self.ffmpeg.clone()));
            }
            Err(e) => return Err(VidnotesError::Extraction(format!("ffmpeg error: {e}"))),
        }

        let written = tokio::fs::metadata(output).await.map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(VidnotesError::Extraction(format!(
                "No audio track found in {}",
                input.display()
            )));
        }

        Ok(())
    }
}
