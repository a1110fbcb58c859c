//! Error types for the workspace core and its collaborators.

use thiserror::Error;

/// An intent rejected locally, before any collaborator was called.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("enter a prompt first")]
    EmptyPrompt,

    #[error("the document body is empty, nothing to continue from")]
    EmptyContent,

    #[error("select a model first")]
    NoModelSelected,

    #[error("model `{0}` is not in the model list")]
    UnknownModel(String),

    #[error("open or create a document first")]
    NoDocumentOpen,

    #[error("character name and description are both required")]
    BlankCharacter,

    #[error("unknown metadata field `{0}`")]
    UnknownField(String),
}

/// A collaborator call that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The save guard is held. Retry once the outstanding save resolves.
    #[error("a save is in progress, try again shortly")]
    SaveInProgress,
}

impl WorkspaceError {
    pub fn is_concurrency_rejection(&self) -> bool {
        matches!(self, Self::SaveInProgress)
    }
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
