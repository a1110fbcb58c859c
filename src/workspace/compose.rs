//! Builds the prompt text sent to the text generation backend.

use crate::error::ValidationError;
use crate::novel::metadata::MetadataStore;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

const WRITING_PROMPT_LABEL: &str = "Writing prompt";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Title,
    Outline,
    DetailedOutline,
    /// Any other tool name; composed as a plain writing prompt.
    Custom(String),
}

impl ToolKind {
    pub const BUILTIN: [ToolKind; 3] = [Self::Title, Self::Outline, Self::DetailedOutline];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Title => "title",
            Self::Outline => "outline",
            Self::DetailedOutline => "detailed-outline",
            Self::Custom(name) => name,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Title => "Title generator",
            Self::Outline => "Outline generator",
            Self::DetailedOutline => "Detailed outline generator",
            Self::Custom(_) => "Toolbox",
        }
    }

    pub fn input_hint(&self) -> &str {
        match self {
            Self::Title => "Theme, genre or keywords of the book...",
            Self::Outline => "Describe the main plot, characters or themes...",
            Self::DetailedOutline => "Paste a basic outline or key scene ideas...",
            Self::Custom(_) => "Enter content or keywords...",
        }
    }

    fn instruction(&self, input: &str) -> Option<String> {
        match self {
            Self::Title => Some(format!(
                "Generate 5 candidate titles for a novel based on the following theme or keywords: {input}"
            )),
            Self::Outline => Some(format!(
                "Produce a top-level plot outline (main parts or acts) for a story based on the following description: {input}"
            )),
            Self::DetailedOutline => Some(format!(
                "Expand the following into a more detailed chapter-by-chapter or scene-by-scene outline: {input}"
            )),
            Self::Custom(_) => None,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolKind {
    type Err = Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.trim() {
            "title" => Self::Title,
            "outline" => Self::Outline,
            "detailed-outline" | "detailed_outline" => Self::DetailedOutline,
            other => Self::Custom(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationMode {
    FreshPrompt,
    Continuation,
    Tool(ToolKind),
}

impl GenerationMode {
    /// Editor modes write into the document body; tool mode does not.
    pub fn targets_document(&self) -> bool {
        !matches!(self, Self::Tool(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
}

/// Everything the composer reads. Borrowed, never mutated.
#[derive(Debug, Clone, Copy)]
pub struct ComposeInput<'a> {
    pub metadata: &'a MetadataStore,
    pub user_text: &'a str,
    pub body: &'a str,
    pub model: Option<&'a str>,
}

pub fn compose(
    mode: &GenerationMode,
    input: ComposeInput<'_>,
) -> Result<GenerationRequest, ValidationError> {
    let prompt = match mode {
        GenerationMode::Continuation => {
            if input.body.trim().is_empty() {
                return Err(ValidationError::EmptyContent);
            }
            input.body.to_string()
        }
        GenerationMode::FreshPrompt => {
            let text = required_text(input.user_text)?;
            let mut prompt = metadata_preamble(input.metadata);
            prompt.push_str(&writing_prompt_block(text));
            prompt
        }
        GenerationMode::Tool(kind) => {
            let text = required_text(input.user_text)?;
            let mut prompt = metadata_preamble(input.metadata);
            match kind.instruction(text) {
                Some(instruction) => prompt.push_str(&instruction),
                None => prompt.push_str(&writing_prompt_block(text)),
            }
            prompt
        }
    };

    let model = input
        .model
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .ok_or(ValidationError::NoModelSelected)?;

    Ok(GenerationRequest {
        model: model.to_string(),
        prompt,
    })
}

fn required_text(text: &str) -> Result<&str, ValidationError> {
    let text = text.trim();
    if text.is_empty() {
        Err(ValidationError::EmptyPrompt)
    } else {
        Ok(text)
    }
}

fn metadata_preamble(metadata: &MetadataStore) -> String {
    metadata
        .sections()
        .map(|(label, value)| format!("{label}:\n{value}\n\n"))
        .collect()
}

fn writing_prompt_block(text: &str) -> String {
    format!("{WRITING_PROMPT_LABEL}:\n{text}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::novel::metadata::MetadataSchema;

    fn input<'a>(metadata: &'a MetadataStore, user_text: &'a str, body: &'a str) -> ComposeInput<'a> {
        ComposeInput {
            metadata,
            user_text,
            body,
            model: Some("llama3"),
        }
    }

    fn filled_metadata() -> MetadataStore {
        let mut metadata = MetadataStore::new(MetadataSchema::glossary_revision());
        metadata.set("characters", "Captain Ilse, smuggler");
        metadata.set("knowledge", "Jump gates decay");
        metadata
    }

    #[test]
    fn continuation_sends_the_body_verbatim() {
        let metadata = filled_metadata();
        let body = "  The ship shuddered.\n";
        let request = compose(&GenerationMode::Continuation, input(&metadata, "ignored", body))
            .expect("continuation should compose");
        assert_eq!(request.prompt, body);
        assert_eq!(request.model, "llama3");
    }

    #[test]
    fn continuation_rejects_blank_body() {
        let metadata = filled_metadata();
        let result = compose(&GenerationMode::Continuation, input(&metadata, "x", " \n\t"));
        assert_eq!(result, Err(ValidationError::EmptyContent));
    }

    #[test]
    fn fresh_prompt_rejects_blank_text() {
        let metadata = MetadataStore::new(MetadataSchema::default());
        let result = compose(&GenerationMode::FreshPrompt, input(&metadata, "   ", ""));
        assert_eq!(result, Err(ValidationError::EmptyPrompt));
    }

    #[test]
    fn fresh_prompt_without_metadata_is_only_the_writing_prompt() {
        let metadata = MetadataStore::new(MetadataSchema::default());
        let request = compose(&GenerationMode::FreshPrompt, input(&metadata, "X", ""))
            .expect("prompt should compose");
        assert_eq!(request.prompt, "Writing prompt:\nX");
    }

    #[test]
    fn fresh_prompt_prepends_labeled_metadata_in_schema_order() {
        let metadata = filled_metadata();
        let request = compose(&GenerationMode::FreshPrompt, input(&metadata, " a heist ", ""))
            .expect("prompt should compose");
        assert_eq!(
            request.prompt,
            "Characters:\nCaptain Ilse, smuggler\n\nKnowledge:\nJump gates decay\n\nWriting prompt:\na heist"
        );
    }

    #[test]
    fn title_tool_places_template_after_metadata_blocks() {
        let metadata = filled_metadata();
        let request = compose(
            &GenerationMode::Tool(ToolKind::Title),
            input(&metadata, "space opera", ""),
        )
        .expect("tool prompt should compose");

        let characters = request.prompt.find("Characters:\nCaptain Ilse").expect("characters block");
        let knowledge = request.prompt.find("Knowledge:\nJump gates decay").expect("knowledge block");
        let template = request
            .prompt
            .find("Generate 5 candidate titles for a novel based on the following theme or keywords: space opera")
            .expect("title template");
        assert!(characters < knowledge && knowledge < template);
        assert!(!request.prompt.contains("Writing prompt:"));
    }

    #[test]
    fn unknown_tool_degrades_to_writing_prompt() {
        let metadata = MetadataStore::new(MetadataSchema::default());
        let kind: ToolKind = "blurb".parse().expect("tool parsing is infallible");
        assert_eq!(kind, ToolKind::Custom("blurb".to_string()));

        let request = compose(&GenerationMode::Tool(kind), input(&metadata, "a blurb", ""))
            .expect("custom tool should compose");
        assert_eq!(request.prompt, "Writing prompt:\na blurb");
    }

    #[test]
    fn missing_model_is_reported_after_text_checks() {
        let metadata = MetadataStore::new(MetadataSchema::default());
        let mut no_model = input(&metadata, "", "");
        no_model.model = None;
        assert_eq!(
            compose(&GenerationMode::Continuation, no_model),
            Err(ValidationError::EmptyContent)
        );

        no_model.user_text = "go";
        assert_eq!(
            compose(&GenerationMode::FreshPrompt, no_model),
            Err(ValidationError::NoModelSelected)
        );
    }

    #[test]
    fn composing_leaves_metadata_untouched() {
        let metadata = filled_metadata();
        let before = metadata.clone();
        let _ = compose(&GenerationMode::FreshPrompt, input(&metadata, "x", ""));
        assert_eq!(metadata, before);
    }
}
