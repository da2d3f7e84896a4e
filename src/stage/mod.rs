//! Pipeline stages.
//!
//! Each stage wraps one external transformation behind [`StageRunner`]:
//!
//! - **Extract**: video file to MP3 audio via ffmpeg.
//! - **Transcribe**: audio to raw transcript text via the whisper CLI.
//! - **Summarize**: transcript to markdown notes via a chat completions API.
//!
//! Runners never retry; the orchestrator owns skip, resume and failure policy.

mod extract;
mod summarize;
mod transcribe;

pub use extract::FfmpegExtractor;
pub use summarize::{validate_notes, NotesGenerator};
pub use transcribe::WhisperCliTranscriber;

use crate::config::{Prompts, Settings};
use crate::error::{Result, VidnotesError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// One of the three ordered transformations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Extract,
    Transcribe,
    Summarize,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Extract, Stage::Transcribe, Stage::Summarize];

    /// Subdirectory of the output root holding this stage's artifacts.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Extract => "audio",
            Stage::Transcribe => "transcriptions",
            Stage::Summarize => "notes",
        }
    }

    /// File extension of this stage's artifacts.
    pub fn extension(&self) -> &'static str {
        match self {
            Stage::Extract => "mp3",
            Stage::Transcribe => "txt",
            Stage::Summarize => "md",
        }
    }

    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::Extract => None,
            Stage::Transcribe => Some(Stage::Extract),
            Stage::Summarize => Some(Stage::Transcribe),
        }
    }

    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Extract => Some(Stage::Transcribe),
            Stage::Transcribe => Some(Stage::Summarize),
            Stage::Summarize => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extract => write!(f, "extract"),
            Stage::Transcribe => write!(f, "transcribe"),
            Stage::Summarize => write!(f, "summarize"),
        }
    }
}

/// Trait for stage implementations.
#[async_trait]
pub trait StageRunner: Send + Sync {
    /// The stage this runner implements.
    fn stage(&self) -> Stage;

    /// Read `input` and write the complete artifact to `output`.
    ///
    /// `output` is a staging path; it becomes visible under its final name
    /// only after this returns `Ok`.
    async fn run(&self, input: &Path, output: &Path) -> Result<()>;
}

/// One runner per stage, selected by [`Stage`].
#[derive(Clone)]
pub struct StageRunners {
    extract: Arc<dyn StageRunner>,
    transcribe: Arc<dyn StageRunner>,
    summarize: Arc<dyn StageRunner>,
}

impl StageRunners {
    /// Assemble runners from custom components.
    ///
    /// Fails if a runner is registered under a stage it does not implement.
    pub fn new(
        extract: Arc<dyn StageRunner>,
        transcribe: Arc<dyn StageRunner>,
        summarize: Arc<dyn StageRunner>,
    ) -> Result<Self> {
        let slots = [
            (Stage::Extract, &extract),
            (Stage::Transcribe, &transcribe),
            (Stage::Summarize, &summarize),
        ];
        for (slot, runner) in slots {
            if runner.stage() != slot {
                return Err(VidnotesError::Config(format!(
                    "{} runner registered for the {} stage",
                    runner.stage(),
                    slot
                )));
            }
        }

        Ok(Self {
            extract,
            transcribe,
            summarize,
        })
    }

    /// Build the production runners (ffmpeg, whisper CLI, chat completions).
    pub fn from_settings(settings: &Settings, prompts: &Prompts, api_key: String) -> Result<Self> {
        let extract = Arc::new(FfmpegExtractor::new(&settings.extraction));
        let transcribe = Arc::new(WhisperCliTranscriber::new(&settings.transcription));
        let summarize = Arc::new(NotesGenerator::new(&settings.generation, prompts, api_key)?);
        Self::new(extract, transcribe, summarize)
    }

    pub fn for_stage(&self, stage: Stage) -> &dyn StageRunner {
        match stage {
            Stage::Extract => self.extract.as_ref(),
            Stage::Transcribe => self.transcribe.as_ref(),
            Stage::Summarize => self.summarize.as_ref(),
        }
    }
}
