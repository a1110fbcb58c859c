use crate::backend::{ModelRoster, TextGenerator, TransportResult};
use crate::error::TransportError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Talks to an Ollama server directly, without the novel server in between.
#[derive(Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> TransportResult<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn checked(response: reqwest::Response) -> TransportResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|payload| payload.get("error").and_then(Value::as_str).map(String::from))
            .unwrap_or_else(|| format!("HTTP error {status}"));
        Err(TransportError::Status {
            status: status.as_u16(),
            message: format!("Ollama API error: {message}"),
        })
    }
}

#[async_trait]
impl ModelRoster for OllamaClient {
    async fn list_models(&self) -> TransportResult<Vec<String>> {
        let response = self
            .http
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;
        let tags: TagsResponse = Self::checked(response).await?.json().await?;
        debug!(count = tags.models.len(), "listed ollama models");
        Ok(tags.models.into_iter().map(|entry| entry.name).collect())
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, model: &str, prompt: &str) -> TransportResult<String> {
        let response = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&json!({
                "model": model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await?;
        let body: GenerateResponse = Self::checked(response).await?.json().await?;
        Ok(body.response)
    }
}

#[cfg(test)]
mod tests {
    use super::{OllamaClient, TagsResponse};

    #[test]
    fn tags_response_tolerates_missing_models_key() {
        let tags: TagsResponse = serde_json::from_str("{}").expect("empty tags should parse");
        assert!(tags.models.is_empty());

        let tags: TagsResponse = serde_json::from_str(
            r#"{"models": [{"name": "llama3:8b", "size": 1}, {"name": "qwen2.5"}]}"#,
        )
        .expect("tags should parse");
        let names: Vec<_> = tags.models.into_iter().map(|entry| entry.name).collect();
        assert_eq!(names, vec!["llama3:8b", "qwen2.5"]);
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/").expect("client should build");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
