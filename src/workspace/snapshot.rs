//! Read-only views of the workspace, published after every state change.

use crate::novel::{CharacterDraft, CharacterId, CharacterSummary, DocumentId, DocumentSummary};
use crate::workspace::compose::ToolKind;
use crate::workspace::roster::RosterView;
use crate::workspace::view::{Panel, PanelKind, ResultPane};

/// The coordinator's core state in the shape the UI reasons about.
///
/// `open_document_id` is set exactly when the editor panel is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceState {
    pub open_document_id: Option<DocumentId>,
    pub active_panel: PanelKind,
    pub active_tool: Option<ToolKind>,
    pub saving: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataEntry {
    pub key: String,
    pub label: String,
    pub value: String,
}

/// The loaded document, which stays loaded while other panels are shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentView {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub metadata: Vec<MetadataEntry>,
    pub word_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelList {
    Loading,
    Failed(String),
    Ready(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelsView {
    pub list: ModelList,
    pub selected: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CharacterForm {
    /// Set when the form holds an existing character; saving then updates it.
    pub editing: Option<CharacterId>,
    pub draft: CharacterDraft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub level: StatusLevel,
    pub message: String,
}

impl StatusLine {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: StatusLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceSnapshot {
    pub state: WorkspaceState,
    pub panel: Panel,
    pub document: Option<DocumentView>,
    /// Bumped whenever the workspace itself rewrites text the user may be
    /// editing (document body, metadata, prompt, tool input, character form).
    pub revision: u64,
    pub prompt: String,
    pub tool_input: String,
    pub result: Option<ResultPane>,
    pub documents: RosterView<DocumentSummary>,
    pub characters: RosterView<CharacterSummary>,
    pub models: ModelsView,
    pub character_form: CharacterForm,
    pub status: Option<StatusLine>,
    pub generating: bool,
}
