//! Configuration settings for Vidnotes.

use crate::error::{Result, VidnotesError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub extraction: ExtractionSettings,
    pub transcription: TranscriptionSettings,
    pub generation: GenerationSettings,
    pub pipeline: PipelineSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Root directory for audio/, transcriptions/ and notes/.
    pub output_dir: String,
    /// Log level used when no -v flag is given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Whisper model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelSize {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute device for transcription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Let the transcriber pick (accelerator if available, else CPU).
    #[default]
    Auto,
    Cpu,
    /// CUDA accelerator.
    #[value(alias = "accelerator", alias = "gpu")]
    #[serde(alias = "accelerator", alias = "gpu")]
    Cuda,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Spoken language hint: `auto` or an ISO 639 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    #[default]
    Auto,
    Code(String),
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "auto" || s.is_empty() {
            return Ok(Language::Auto);
        }
        let iso = Regex::new(r"^[a-z]{2,3}$").map_err(|e| e.to_string())?;
        if iso.is_match(&s) {
            Ok(Language::Code(s))
        } else {
            Err(format!("Unknown language '{}': expected 'auto' or an ISO 639 code", s))
        }
    }
}

impl TryFrom<String> for Language {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Language> for String {
    fn from(value: Language) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::Auto => write!(f, "auto"),
            Language::Code(code) => write!(f, "{}", code),
        }
    }
}

/// Video to audio extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// ffmpeg executable.
    pub ffmpeg_path: String,
    /// Upper bound for a single extraction.
    pub timeout_secs: u64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            timeout_secs: 1800,
        }
    }
}

/// Speech-to-text settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    pub model: ModelSize,
    pub device: Device,
    pub language: Language,
    /// whisper executable.
    pub whisper_path: String,
    /// Upper bound for a single transcription.
    pub timeout_secs: u64,
    /// Transcriptions allowed in flight on the device at once.
    pub device_concurrency: usize,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            model: ModelSize::Base,
            device: Device::Auto,
            language: Language::Auto,
            whisper_path: "whisper".to_string(),
            timeout_secs: 7200, // 2 hours
            device_concurrency: 1,
        }
    }
}

/// Notes generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Chat model identifier.
    pub model: String,
    /// Base URL of an OpenAI-compatible chat completions API.
    pub api_base: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum tokens in the generated notes.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Notes prompt template version.
    pub prompt_version: String,
    /// Upper bound for a single generation request.
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_base: "https://api.anthropic.com/v1".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 8192,
            temperature: 0.0,
            prompt_version: "v1".to_string(),
            timeout_secs: 300,
        }
    }
}

/// How an existing artifact is judged up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StalenessPolicy {
    /// Compare against the input's modification time.
    #[default]
    Mtime,
    /// Any existing artifact with an existing input is up to date.
    Existence,
}

/// Batch execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Abort the batch on the first item failure.
    pub fail_fast: bool,
    /// Items processed concurrently.
    pub jobs: usize,
    pub staleness: StalenessPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fail_fast: false,
            jobs: 1,
            staleness: StalenessPolicy::Mtime,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else if path.is_some() {
            Err(VidnotesError::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )))
        } else {
            Ok(Settings::default())
        }
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vidnotes")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded output root.
    pub fn output_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.output_dir)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.jobs == 0 {
            return Err(VidnotesError::Config("pipeline.jobs must be at least 1".into()));
        }
        if self.transcription.device_concurrency == 0 {
            return Err(VidnotesError::Config(
                "transcription.device_concurrency must be at least 1".into(),
            ));
        }
        if self.generation.max_tokens == 0 {
            return Err(VidnotesError::Config("generation.max_tokens must be positive".into()));
        }
        let timeouts = [
            ("extraction", self.extraction.timeout_secs),
            ("transcription", self.transcription.timeout_secs),
            ("generation", self.generation.timeout_secs),
        ];
        for (section, secs) in timeouts {
            if secs == 0 {
                return Err(VidnotesError::Config(format!(
                    "{}.timeout_secs must be positive",
                    section
                )));
            }
        }
        Ok(())
    }

    /// Read the notes API credential from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        let var = &self.generation.api_key_env;
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            Ok(_) => Err(VidnotesError::CredentialMissing(format!(
                "{} is empty. Set it with: export {}='...'",
                var, var
            ))),
            Err(_) => Err(VidnotesError::CredentialMissing(format!(
                "{} not set. Set it with: export {}='...'",
                var, var
            ))),
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction.timeout_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.transcription.timeout_secs)
    }

    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.timeout_secs)
    }
}
