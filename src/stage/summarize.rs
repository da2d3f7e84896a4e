//! Notes generation from a transcript.

use super::{Stage, StageRunner};
use crate::config::{GenerationSettings, NotesPrompt, Prompts};
use crate::error::{Result, VidnotesError};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Generates markdown lecture notes with a chat model.
pub struct NotesGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    prompt: NotesPrompt,
    prompts: Prompts,
}

impl NotesGenerator {
    /// Create a generator for the configured model and prompt version.
    pub fn new(settings: &GenerationSettings, prompts: &Prompts, api_key: String) -> Result<Self> {
        let prompt = prompts.notes_prompt(&settings.prompt_version)?.clone();

        Ok(Self {
            client: create_client(settings, &api_key)?,
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            prompt,
            prompts: prompts.clone(),
        })
    }

    /// Build the system and user messages for a transcript.
    fn messages(&self, transcript: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), transcript.to_string());

        let system = self.prompts.render_with_custom(&self.prompt.system, &vars);
        let user = self.prompts.render_with_custom(&self.prompt.user, &vars);

        Ok(vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system)
                .build()
                .map_err(|e| VidnotesError::Generation(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user)
                .build()
                .map_err(|e| VidnotesError::Generation(e.to_string()))?
                .into(),
        ])
    }

    /// Generate notes for a transcript.
    #[instrument(skip(self, transcript), fields(model = %self.model, chars = transcript.len()))]
    pub async fn generate_notes(&self, transcript: &str) -> Result<String> {
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(VidnotesError::Generation("Transcript is empty".to_string()));
        }

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(self.messages(transcript)?)
            .max_completion_tokens(self.max_tokens)
            .temperature(self.temperature)
            .build()
            .map_err(|e| VidnotesError::Generation(e.to_string()))?;

        info!("Requesting notes");
        let response = self.client.chat().create(request).await.map_err(|e| {
            VidnotesError::Generation(format!("Notes request failed: {}", e))
        })?;

        let notes = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| VidnotesError::Generation("Empty response from model".to_string()))?
            .trim()
            .to_string();

        validate_notes(&notes)?;
        debug!("Generated {} characters of notes", notes.len());

        Ok(notes)
    }
}

/// Check that a model response looks like markdown notes.
pub fn validate_notes(notes: &str) -> Result<()> {
    if notes.trim().is_empty() {
        return Err(VidnotesError::Generation("Empty response from model".to_string()));
    }

    let heading = Regex::new(r"(?m)^#{1,6}[ \t]+\S").map_err(|e| VidnotesError::Generation(e.to_string()))?;
    if !heading.is_match(notes) {
        return Err(VidnotesError::Generation(
            "Response did not match the expected notes format (no markdown headings)".to_string(),
        ));
    }

    Ok(())
}

#[async_trait]
impl StageRunner for NotesGenerator {
    fn stage(&self) -> Stage {
        Stage::Summarize
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let transcript = tokio::fs::read_to_string(input).await.map_err(|e| {
            VidnotesError::Generation(format!("Cannot read transcript {}: {}", input.display(), e))
        })?;

        let notes = self.generate_notes(&transcript).await?;
        tokio::fs::write(output, format!("{}\n", notes)).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> NotesGenerator {
        NotesGenerator::new(&GenerationSettings::default(), &Prompts::default(), "test-key".into())
            .unwrap()
    }

    #[test]
    fn test_validate_notes_accepts_markdown() {
        assert!(validate_notes("# Sorting\n\n## Prerequisites\n- arrays").is_ok());
        assert!(validate_notes("Intro text\n\n### Details\nmore").is_ok());
    }

    #[test]
    fn test_validate_notes_rejects_unstructured() {
        assert!(validate_notes("").is_err());
        assert!(validate_notes("   \n").is_err());
        assert!(validate_notes("Just a paragraph with a #hashtag").is_err());
    }

    #[test]
    fn test_unknown_prompt_version() {
        let settings = GenerationSettings {
            prompt_version: "v42".into(),
            ..Default::default()
        };
        let result = NotesGenerator::new(&settings, &Prompts::default(), "k".into());
        assert!(matches!(result, Err(VidnotesError::Config(_))));
    }

    #[test]
    fn test_messages_embed_transcript() {
        let messages = generator().messages("the lecture text").unwrap();
        assert_eq!(messages.len(), 2);
        match &messages[0] {
            ChatCompletionRequestMessage::System(m) => {
                let json = serde_json::to_string(&m.content).unwrap();
                assert!(json.contains("the lecture text"));
                assert!(!json.contains("{{transcript}}"));
            }
            other => panic!("expected system message, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_transcript_fails_without_request() {
        let err = generator().generate_notes("  \n ").await.unwrap_err();
        assert!(matches!(err, VidnotesError::Generation(_)));
    }

    #[tokio::test]
    async fn test_missing_transcript_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = generator()
            .run(&dir.path().join("none.txt"), &dir.path().join("notes.md"))
            .await
            .unwrap_err();
        assert!(matches!(err, VidnotesError::Generation(_)));
    }
}
