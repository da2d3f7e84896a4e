//! Local Whisper transcription through the `whisper` command line tool.

use super::{Stage, StageRunner};
use crate::config::{Device, Language, ModelSize, TranscriptionSettings};
use crate::error::{Result, VidnotesError};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, instrument};

/// Whisper CLI transcriber.
pub struct WhisperCliTranscriber {
    binary: String,
    model: ModelSize,
    device: Device,
    language: Language,
}

impl WhisperCliTranscriber {
    pub fn new(settings: &TranscriptionSettings) -> Self {
        Self {
            binary: settings.whisper_path.clone(),
            model: settings.model,
            device: settings.device,
            language: settings.language.clone(),
        }
    }

    /// Command line arguments for one transcription.
    fn args(&self, audio_path: &Path, scratch: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            audio_path.into(),
            "--model".into(),
            self.model.as_str().into(),
            "--output_format".into(),
            "txt".into(),
            "--output_dir".into(),
            scratch.into(),
            "--verbose".into(),
            "False".into(),
        ];

        match self.device {
            Device::Auto => {}
            Device::Cpu => {
                // fp16 is unsupported on CPU and only produces a warning
                args.extend(["--device", "cpu", "--fp16", "False"].map(OsString::from));
            }
            Device::Cuda => args.extend(["--device", "cuda"].map(OsString::from)),
        }

        if let Language::Code(code) = &self.language {
            args.extend([OsString::from("--language"), OsString::from(code)]);
        }

        args
    }
}

#[async_trait]
impl StageRunner for WhisperCliTranscriber {
    fn stage(&self) -> Stage {
        Stage::Transcribe
    }

    #[instrument(skip(self), fields(audio = %input.display(), model = %self.model))]
    async fn run(&self, input: &Path, output: &Path) -> Result<()> {
        if !input.is_file() {
            return Err(VidnotesError::Transcription(format!(
                "Audio file not found: {}",
                input.display()
            )));
        }

        let scratch = tempfile::tempdir()?;
        info!("Transcribing with whisper {} on {}", self.model, self.device);

        let result = Command::new(&self.binary)
            .args(self.args(input, scratch.path()))
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        match result {
            Ok(out) if out.status.success() => {}
            Ok(out) => {
                let err = String::from_utf8_lossy(&out.stderr);
                return Err(VidnotesError::Transcription(format!(
                    "whisper failed (model {}): {}",
                    self.model,
                    err.trim()
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VidnotesError::ToolNotFound(self.binary.clone()));
            }
            Err(e) => return Err(VidnotesError::Transcription(format!("whisper error: {e}"))),
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());
        let produced = scratch.path().join(format!("{}.txt", stem));

        let text = tokio::fs::read_to_string(&produced).await.map_err(|e| {
            VidnotesError::Transcription(format!("whisper produced no transcript: {e}"))
        })?;
        let text = text.trim();

        if text.is_empty() {
            return Err(VidnotesError::Transcription(format!(
                "No speech detected in {}",
                input.display()
            )));
        }

        debug!("Transcript has {} characters", text.len());
        tokio::fs::write(output, format!("{}\n", text)).await?;

        Ok(())
    }
}
