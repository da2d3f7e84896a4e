//! Vidnotes - Lecture videos to structured notes
//!
//! A batch CLI tool that turns lecture recordings into markdown study notes.
//!
//! # Overview
//!
//! Each video goes through three stages, each producing one artifact:
//! - Extract: audio track to `audio/<key>.mp3` (ffmpeg)
//! - Transcribe: speech to `transcriptions/<key>.txt` (Whisper)
//! - Summarize: transcript to `notes/<key>.md` (language model)
//!
//! Artifacts that are already up to date are reused, so an interrupted or
//! partially failed batch can simply be run again.
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `discovery` - Finding the videos of a batch
//! - `artifact` - Output layout, staleness and atomic commits
//! - `stage` - Stage runners (extraction, transcription, notes)
//! - `orchestrator` - Batch and per-item pipeline control
//! - `report` - Batch outcomes
//!
//! # Example
//!
//! ```rust,no_run
//! use vidnotes::config::{Prompts, Settings};
//! use vidnotes::discovery::discover;
//! use vidnotes::orchestrator::PipelineController;
//! use vidnotes::stage::StageRunners;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let prompts = Prompts::load(None, None)?;
//!     let runners = StageRunners::from_settings(&settings, &prompts, settings.api_key()?)?;
//!
//!     let items = discover(std::path::Path::new("lectures/"))?;
//!     let controller = PipelineController::new(&settings, runners);
//!     let report = controller.run(&items, &CancellationToken::new()).await?;
//!     println!("{} completed, {} failed", report.completed(), report.failed());
//!
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod report;
pub mod stage;

pub use error::{Result, VidnotesError};
