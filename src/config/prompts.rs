//! Prompt templates for Vidnotes.
//!
//! Notes prompts are versioned. Additional versions, or overrides of the
//! built-in ones, can be placed in `notes.toml` inside the custom prompts
//! directory:
//!
//! ```toml
//! [v2]
//! system = "..."
//! user = "..."
//! ```

use crate::error::{Result, VidnotesError};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Prompts {
    /// Notes prompts keyed by template version.
    pub notes: BTreeMap<String, NotesPrompt>,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        let mut notes = BTreeMap::new();
        notes.insert("v1".to_string(), NotesPrompt::default());
        Self {
            notes,
            variables: HashMap::new(),
        }
    }
}

/// Prompt pair for turning a lecture transcript into notes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotesPrompt {
    /// System prompt; `{{transcript}}` is replaced by the transcript text.
    pub system: String,
    pub user: String,
}

impl Default for NotesPrompt {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant tasked with creating detailed and enriched notes from a lecture transcription. Act as a top student in a computer science class who diligently takes notes and has a keen interest in coding examples and in the mathematical and scientific prerequisites. Transform the lecture transcription into comprehensive, well-structured notes that will be useful for future reference and study.

Here is the lecture transcription:
<lecture_transcription>
{{transcript}}
</lecture_transcription>

Structure your notes as follows:
1. Lecture Title
2. Prerequisite Concepts
3. Detailed Notes
4. Python Examples

1. Lecture Title:
   - Extract or infer the main topic of the lecture from the transcription.
   - Present it as a clear, concise markdown title (# Title).

2. Prerequisite Concepts:
   - Explain key concepts a student should understand before engaging with this material.

3. Detailed Notes:
   - Organize the main content into logical sections and subsections.
   - Use markdown headers (# for main sections, ## for subsections).
   - Include all important points, definitions and explanations from the lecture.
   - Present mathematics with markdown math formatting (e.g., $equation$).
   - Use bullet points or numbered lists where they help readability.
   - Include the examples and analogies given in the lecture.

4. Python Examples:
   - Write Python examples that illustrate the prerequisite concepts and the lecture content.
   - Keep them relevant, clear and well-commented.
   - Use fenced code blocks (```python).

General guidelines:
- Use markdown formatting throughout.
- Be concise yet comprehensive.
- Reflect the lecture accurately without adding external information.
- If parts of the transcription are unclear, say so in the detailed notes."#
                .to_string(),

            user: "Please create detailed notes from the lecture transcription provided.".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let notes_path = custom_path.join("notes.toml");
            if notes_path.exists() {
                let content = std::fs::read_to_string(&notes_path)?;
                let custom: BTreeMap<String, NotesPrompt> = toml::from_str(&content)?;
                prompts.notes.extend(custom);
            }
        }

        Ok(prompts)
    }

    /// Look up the notes prompt for a template version.
    pub fn notes_prompt(&self, version: &str) -> Result<&NotesPrompt> {
        self.notes.get(version).ok_or_else(|| {
            VidnotesError::Config(format!(
                "Unknown notes prompt version '{}' (available: {})",
                version,
                self.notes.keys().cloned().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Render a prompt template with the given variables.
    ///
    /// Placeholders are substituted in one pass, so substituted text is never
    /// rendered again. Unknown placeholders are left as written.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let placeholder = match Regex::new(r"\{\{(\w+)\}\}") {
            Ok(re) => re,
            Err(_) => return template.to_string(),
        };
        placeholder
            .replace_all(template, |caps: &Captures| match vars.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            })
            .into_owned()
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompts() {
        let prompts = Prompts::default();
        let v1 = prompts.notes_prompt("v1").unwrap();
        assert!(v1.system.contains("{{transcript}}"));
        assert!(!v1.user.is_empty());
    }

    #[test]
    fn test_unknown_version() {
        let prompts = Prompts::default();
        let err = prompts.notes_prompt("v9").unwrap_err();
        assert!(err.to_string().contains("v1"));
    }

    #[test]
    fn test_render_template() {
        let template = "Hello {{name}}, you have {{count}} messages.";
        let mut vars = HashMap::new();
        vars.insert("name".to_string(), "Alice".to_string());
        vars.insert("count".to_string(), "5".to_string());

        let result = Prompts::render(template, &vars);
        assert_eq!(result, "Hello Alice, you have 5 messages.");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let vars = HashMap::from([("name".to_string(), "Alice".to_string())]);
        assert_eq!(Prompts::render("{{name}} {{other}}", &vars), "Alice {{other}}");
    }

    #[test]
    fn test_substituted_text_is_not_rendered_again() {
        let mut custom: HashMap<String, String> = (0..20)
            .map(|i| (format!("filler{}", i), i.to_string()))
            .collect();
        custom.insert("course".to_string(), "CS101".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert(
            "transcript".to_string(),
            "In Jinja you write {{course}} to print a value".to_string(),
        );

        for _ in 0..20 {
            let out = prompts.render_with_custom("{{course}} T: {{transcript}}", &vars);
            assert_eq!(out, "CS101 T: In Jinja you write {{course}} to print a value");
        }
    }

    #[test]
    fn test_custom_variables_lose_to_provided() {
        let mut custom = HashMap::new();
        custom.insert("course".to_string(), "CS101".to_string());
        custom.insert("transcript".to_string(), "ignored".to_string());
        let prompts = Prompts::load(None, Some(&custom)).unwrap();

        let mut vars = HashMap::new();
        vars.insert("transcript".to_string(), "hello".to_string());
        let out = prompts.render_with_custom("{{course}}: {{transcript}}", &vars);
        assert_eq!(out, "CS101: hello");
    }

    #[test]
    fn test_load_custom_version() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("notes.toml"),
            "[v2]\nsystem = \"Summarize {{transcript}}\"\nuser = \"Go\"\n",
        )
        .unwrap();

        let prompts = Prompts::load(dir.path().to_str(), None).unwrap();
        assert_eq!(prompts.notes_prompt("v2").unwrap().user, "Go");
        assert!(prompts.notes_prompt("v1").is_ok());
    }
}
