//! Configuration module for Vidnotes.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{NotesPrompt, Prompts};
pub use settings::{
    Device, ExtractionSettings, GeneralSettings, GenerationSettings, Language, ModelSize,
    PipelineSettings, PromptSettings, Settings, StalenessPolicy, TranscriptionSettings,
};
