//! Client for the novel server's JSON API.

use crate::backend::{
    CharacterLibrary, DocumentStore, Exporter, ModelRoster, TextGenerator, TransportResult,
};
use crate::error::TransportError;
use crate::novel::{
    Character, CharacterDraft, CharacterId, CharacterSummary, DeleteReceipt, Document,
    DocumentId, DocumentMetadata, DocumentSummary, DocumentUpdate, ExportFormat, ExportReceipt,
};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Clone)]
pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

/// Novel record as returned by the server. Any string field other than the
/// known ones is treated as metadata.
#[derive(Debug, Deserialize)]
struct WireNovel {
    id: DocumentId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl WireNovel {
    fn into_document(self) -> Document {
        let metadata: DocumentMetadata = self
            .extra
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::String(text) => Some((key, text)),
                _ => None,
            })
            .collect();
        Document {
            id: self.id,
            title: self.title.unwrap_or_else(|| "Untitled".to_string()),
            content: self.content.unwrap_or_default(),
            metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    generated_text: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> TransportResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("novel-workbench/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> TransportResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| format!("HTTP error {status}"));
        debug!(operation, status = status.as_u16(), %message, "server rejected request");
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(message));
        }
        Err(TransportError::Status {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> TransportResult<T> {
        let response = self.send(request, operation).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| TransportError::Decode(format!("{operation}: {err}")))
    }
}

/// Pulls `error` or `message` out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let payload: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| payload.get(key).and_then(Value::as_str))
        .map(ToString::to_string)
}

#[async_trait]
impl DocumentStore for HttpBackend {
    async fn list(&self) -> TransportResult<Vec<DocumentSummary>> {
        self.send_json(self.http.get(self.url("/api/novels")), "list_novels")
            .await
    }

    async fn get(&self, id: &DocumentId) -> TransportResult<Document> {
        let wire: WireNovel = self
            .send_json(
                self.http.get(self.url(&format!("/api/novels/{id}"))),
                "get_novel",
            )
            .await?;
        Ok(wire.into_document())
    }

    async fn create(&self, title: &str) -> TransportResult<Document> {
        let wire: WireNovel = self
            .send_json(
                self.http
                    .post(self.url("/api/novels"))
                    .json(&json!({ "title": title })),
                "create_novel",
            )
            .await?;
        let mut document = wire.into_document();
        if document.title.is_empty() || document.title == "Untitled" {
            document.title = title.to_string();
        }
        Ok(document)
    }

    async fn update(&self, id: &DocumentId, update: &DocumentUpdate) -> TransportResult<()> {
        self.send(
            self.http
                .put(self.url(&format!("/api/novels/{id}")))
                .json(update),
            "update_novel",
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> TransportResult<DeleteReceipt> {
        self.send_json(
            self.http.delete(self.url(&format!("/api/novels/{id}"))),
            "delete_novel",
        )
        .await
    }
}

#[async_trait]
impl CharacterLibrary for HttpBackend {
    async fn list(&self) -> TransportResult<Vec<CharacterSummary>> {
        self.send_json(self.http.get(self.url("/api/characters")), "list_characters")
            .await
    }

    async fn get(&self, id: &CharacterId) -> TransportResult<Character> {
        self.send_json(
            self.http.get(self.url(&format!("/api/characters/{id}"))),
            "get_character",
        )
        .await
    }

    async fn create(&self, draft: &CharacterDraft) -> TransportResult<Character> {
        self.send_json(
            self.http.post(self.url("/api/characters")).json(draft),
            "create_character",
        )
        .await
    }

    async fn update(&self, id: &CharacterId, draft: &CharacterDraft) -> TransportResult<Character> {
        self.send_json(
            self.http
                .put(self.url(&format!("/api/characters/{id}")))
                .json(draft),
            "update_character",
        )
        .await
    }

    async fn delete(&self, id: &CharacterId) -> TransportResult<DeleteReceipt> {
        self.send_json(
            self.http.delete(self.url(&format!("/api/characters/{id}"))),
            "delete_character",
        )
        .await
    }
}

#[async_trait]
impl ModelRoster for HttpBackend {
    async fn list_models(&self) -> TransportResult<Vec<String>> {
        self.send_json(self.http.get(self.url("/api/models")), "list_models")
            .await
    }
}

#[async_trait]
impl TextGenerator for HttpBackend {
    async fn generate(&self, model: &str, prompt: &str) -> TransportResult<String> {
        let response: GenerateResponse = self
            .send_json(
                self.http.post(self.url("/api/generate")).json(&json!({
                    "model": model,
                    "prompt": prompt,
                    "stream": false,
                })),
                "generate",
            )
            .await?;
        Ok(response.generated_text)
    }
}

#[async_trait]
impl Exporter for HttpBackend {
    async fn export(&self, id: &DocumentId, format: ExportFormat) -> TransportResult<ExportReceipt> {
        self.send_json(
            self.http
                .post(self.url(&format!("/api/novels/{id}/export/{format}"))),
            "export_novel",
        )
        .await
    }
}
