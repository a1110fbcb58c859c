use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod metadata;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(String);

impl CharacterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Free-text metadata fields of a document, keyed by field name.
pub type DocumentMetadata = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub id: DocumentId,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
        }
    }
}

/// Body and metadata sent by a save. Metadata keys are written next to
/// `content` in the request object.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DocumentUpdate {
    pub content: String,
    #[serde(flatten)]
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: String,
    pub description: String,
}

impl Character {
    pub fn summary(&self) -> CharacterSummary {
        CharacterSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSummary {
    pub id: CharacterId,
    pub name: String,
}

/// Name and description as entered in the character form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CharacterDraft {
    pub name: String,
    pub description: String,
}

impl CharacterDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.description.trim().is_empty()
    }

    /// Text block copied into a document's characters field.
    pub fn to_attachment(&self) -> String {
        format!(
            "Name: {}\nDescription: {}\n--------------------",
            self.name.trim(),
            self.description.trim()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Txt,
    Json,
    Docx,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [Self::Txt, Self::Json, Self::Docx];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Docx => "docx",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            "docx" => Ok(Self::Docx),
            other => Err(format!("unknown export format `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ExportReceipt {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub filepath: Option<String>,
}

/// Outcome of a delete, carrying the server's confirmation text when given.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct DeleteReceipt {
    #[serde(default)]
    pub message: Option<String>,
}

/// Non-whitespace characters in `text`, the count shown under the editor.
pub fn word_count(text: &str) -> usize {
    text.chars().filter(|ch| !ch.is_whitespace()).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_update_writes_metadata_beside_content() {
        let mut metadata = DocumentMetadata::new();
        metadata.insert("characters".to_string(), "Ann".to_string());
        let update = DocumentUpdate {
            content: "body".to_string(),
            metadata,
        };

        let value = serde_json::to_value(&update).expect("update should serialize");
        assert_eq!(value["content"], "body");
        assert_eq!(value["characters"], "Ann");
    }

    #[test]
    fn word_count_ignores_whitespace_and_counts_cjk_characters() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("a b\n\tc"), 3);
        assert_eq!(word_count("第一章 开始"), 5);
    }

    #[test]
    fn attachment_block_trims_fields() {
        let draft = CharacterDraft::new("  Mira ", " pilot\n");
        assert_eq!(
            draft.to_attachment(),
            "Name: Mira\nDescription: pilot\n--------------------"
        );
    }

    #[test]
    fn export_format_parses_case_insensitively() {
        assert_eq!("DOCX".parse::<ExportFormat>(), Ok(ExportFormat::Docx));
        assert!("pdf".parse::<ExportFormat>().is_err());
    }
}
