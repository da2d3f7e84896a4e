//! CLI module for Vidnotes.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::config::{Device, Language, ModelSize, Settings};
use clap::Parser;
use std::path::PathBuf;

/// Vidnotes - Lecture videos to structured notes
///
/// Converts a lecture video, or every video in a directory, into markdown
/// notes: audio is extracted, transcribed with Whisper and summarized by a
/// language model. Finished stages are reused on the next run.
#[derive(Parser, Debug)]
#[command(name = "vidnotes")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Video file or directory containing videos
    pub input: PathBuf,

    /// Output directory for audio/, transcriptions/ and notes/
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Whisper model size used for transcription
    #[arg(short, long, value_enum)]
    pub whisper_model: Option<ModelSize>,

    /// Device to run Whisper on
    #[arg(short, long, value_enum)]
    pub device: Option<Device>,

    /// Spoken language ('auto' or an ISO 639 code such as 'en')
    #[arg(short, long)]
    pub language: Option<Language>,

    /// Model used for notes generation
    #[arg(short = 'm', long)]
    pub notes_model: Option<String>,

    /// Stop the whole batch at the first failed video
    #[arg(long)]
    pub fail_fast: bool,

    /// Number of videos processed concurrently
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Re-run every stage even if its output is up to date
    #[arg(short, long)]
    pub force: bool,

    /// Show what would run without running it
    #[arg(long)]
    pub dry_run: bool,

    /// Write the batch report as JSON to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Apply command line overrides on top of loaded settings.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(dir) = &self.output_dir {
            settings.general.output_dir = dir.to_string_lossy().to_string();
        }
        if let Some(model) = self.whisper_model {
            settings.transcription.model = model;
        }
        if let Some(device) = self.device {
            settings.transcription.device = device;
        }
        if let Some(language) = &self.language {
            settings.transcription.language = language.clone();
        }
        if let Some(model) = &self.notes_model {
            settings.generation.model = model.clone();
        }
        if self.fail_fast {
            settings.pipeline.fail_fast = true;
        }
        if let Some(jobs) = self.jobs {
            settings.pipeline.jobs = jobs;
        }
    }

    /// Log filter level for the given verbosity.
    pub fn log_level<'a>(&self, configured: &'a str) -> &'a str {
        match self.verbose {
            0 => configured,
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
