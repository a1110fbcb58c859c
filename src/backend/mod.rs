//! Collaborators the workspace core talks to.
//!
//! Each concern is a separate trait so a deployment can mix backends, e.g.
//! documents held in process while generation goes to a local Ollama.

use crate::error::TransportError;
use crate::novel::{
    Character, CharacterDraft, CharacterId, CharacterSummary, DeleteReceipt, Document,
    DocumentId, DocumentSummary, DocumentUpdate, ExportFormat, ExportReceipt,
};
use async_trait::async_trait;
use std::sync::Arc;

pub mod http;
pub mod memory;
pub mod ollama;

pub type TransportResult<T> = Result<T, TransportError>;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self) -> TransportResult<Vec<DocumentSummary>>;

    async fn get(&self, id: &DocumentId) -> TransportResult<Document>;

    /// The store assigns the id.
    async fn create(&self, title: &str) -> TransportResult<Document>;

    async fn update(&self, id: &DocumentId, update: &DocumentUpdate) -> TransportResult<()>;

    async fn delete(&self, id: &DocumentId) -> TransportResult<DeleteReceipt>;
}

#[async_trait]
pub trait CharacterLibrary: Send + Sync {
    async fn list(&self) -> TransportResult<Vec<CharacterSummary>>;

    async fn get(&self, id: &CharacterId) -> TransportResult<Character>;

    async fn create(&self, draft: &CharacterDraft) -> TransportResult<Character>;

    async fn update(&self, id: &CharacterId, draft: &CharacterDraft) -> TransportResult<Character>;

    async fn delete(&self, id: &CharacterId) -> TransportResult<DeleteReceipt>;
}

#[async_trait]
pub trait ModelRoster: Send + Sync {
    /// An empty list is a valid answer, distinct from an error.
    async fn list_models(&self) -> TransportResult<Vec<String>>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> TransportResult<String>;
}

#[async_trait]
pub trait Exporter: Send + Sync {
    async fn export(&self, id: &DocumentId, format: ExportFormat) -> TransportResult<ExportReceipt>;
}

/// The full set of collaborators handed to a [`crate::workspace::Workspace`].
#[derive(Clone)]
pub struct Services {
    pub documents: Arc<dyn DocumentStore>,
    pub characters: Arc<dyn CharacterLibrary>,
    pub models: Arc<dyn ModelRoster>,
    pub generator: Arc<dyn TextGenerator>,
    pub exporter: Arc<dyn Exporter>,
}

impl Services {
    /// Uses one backend for every concern.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: DocumentStore + CharacterLibrary + ModelRoster + TextGenerator + Exporter + 'static,
    {
        Self {
            documents: backend.clone(),
            characters: backend.clone(),
            models: backend.clone(),
            generator: backend.clone(),
            exporter: backend,
        }
    }

    /// Documents, characters and exports from `store`; models and generation
    /// from `llm`.
    pub fn split<S, L>(store: Arc<S>, llm: Arc<L>) -> Self
    where
        S: DocumentStore + CharacterLibrary + Exporter + 'static,
        L: ModelRoster + TextGenerator + 'static,
    {
        Self {
            documents: store.clone(),
            characters: store.clone(),
            models: llm.clone(),
            generator: llm,
            exporter: store,
        }
    }
}
