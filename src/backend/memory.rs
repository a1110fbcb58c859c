//! In-process document and character store.
//!
//! Used for the `local` backend mode, where the novel server is not running.
//! Nothing survives a restart; exports are written to disk.

use crate::backend::{CharacterLibrary, DocumentStore, Exporter, TransportResult};
use crate::error::TransportError;
use crate::novel::metadata::MetadataSchema;
use crate::novel::{
    Character, CharacterDraft, CharacterId, CharacterSummary, DeleteReceipt, Document,
    DocumentId, DocumentMetadata, DocumentSummary, DocumentUpdate, ExportFormat, ExportReceipt,
};
use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    novels: Vec<Document>,
    characters: Vec<Character>,
}

pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    schema: MetadataSchema,
    export_dir: PathBuf,
}

impl MemoryBackend {
    pub fn new(schema: MetadataSchema, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            schema,
            export_dir: export_dir.into(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn blank_metadata(&self) -> DocumentMetadata {
        self.schema
            .fields()
            .iter()
            .map(|field| (field.key.clone(), String::new()))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MemoryBackend {
    async fn list(&self) -> TransportResult<Vec<DocumentSummary>> {
        Ok(self.state().novels.iter().map(Document::summary).collect())
    }

    async fn get(&self, id: &DocumentId) -> TransportResult<Document> {
        self.state()
            .novels
            .iter()
            .find(|novel| &novel.id == id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("novel {id}")))
    }

    async fn create(&self, title: &str) -> TransportResult<Document> {
        let document = Document {
            id: DocumentId::new(Uuid::new_v4().to_string()),
            title: title.to_string(),
            content: String::new(),
            metadata: self.blank_metadata(),
        };
        self.state().novels.push(document.clone());
        info!(document_id = %document.id, title, "created novel");
        Ok(document)
    }

    async fn update(&self, id: &DocumentId, update: &DocumentUpdate) -> TransportResult<()> {
        let mut state = self.state();
        let novel = state
            .novels
            .iter_mut()
            .find(|novel| &novel.id == id)
            .ok_or_else(|| TransportError::NotFound(format!("novel {id}")))?;
        novel.content = update.content.clone();
        for (key, value) in &update.metadata {
            novel.metadata.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &DocumentId) -> TransportResult<DeleteReceipt> {
        let mut state = self.state();
        let position = state
            .novels
            .iter()
            .position(|novel| &novel.id == id)
            .ok_or_else(|| TransportError::NotFound(format!("novel {id}")))?;
        let removed = state.novels.remove(position);
        Ok(DeleteReceipt {
            message: Some(format!("Novel '{}' deleted", removed.title)),
        })
    }
}

#[async_trait]
impl CharacterLibrary for MemoryBackend {
    async fn list(&self) -> TransportResult<Vec<CharacterSummary>> {
        Ok(self
            .state()
            .characters
            .iter()
            .map(Character::summary)
            .collect())
    }

    async fn get(&self, id: &CharacterId) -> TransportResult<Character> {
        self.state()
            .characters
            .iter()
            .find(|character| &character.id == id)
            .cloned()
            .ok_or_else(|| TransportError::NotFound(format!("character {id}")))
    }

    async fn create(&self, draft: &CharacterDraft) -> TransportResult<Character> {
        let character = Character {
            id: CharacterId::new(Uuid::new_v4().to_string()),
            name: draft.name.clone(),
            description: draft.description.clone(),
        };
        self.state().characters.push(character.clone());
        Ok(character)
    }

    async fn update(&self, id: &CharacterId, draft: &CharacterDraft) -> TransportResult<Character> {
        let mut state = self.state();
        let character = state
            .characters
            .iter_mut()
            .find(|character| &character.id == id)
            .ok_or_else(|| TransportError::NotFound(format!("character {id}")))?;
        character.name = draft.name.clone();
        character.description = draft.description.clone();
        Ok(character.clone())
    }

    async fn delete(&self, id: &CharacterId) -> TransportResult<DeleteReceipt> {
        let mut state = self.state();
        let before = state.characters.len();
        state.characters.retain(|character| &character.id != id);
        if state.characters.len() == before {
            return Err(TransportError::NotFound(format!("character {id}")));
        }
        Ok(DeleteReceipt {
            message: Some("Character deleted".to_string()),
        })
    }
}

#[async_trait]
impl Exporter for MemoryBackend {
    async fn export(&self, id: &DocumentId, format: ExportFormat) -> TransportResult<ExportReceipt> {
        let document = DocumentStore::get(self, id).await?;
        let rendered = match format {
            ExportFormat::Txt => render_txt(&document, &self.schema),
            ExportFormat::Json => render_json(&document, &self.schema)?,
            ExportFormat::Docx => {
                return Err(TransportError::Unsupported(
                    "docx export needs the novel server".to_string(),
                ))
            }
        };

        let filename = export_filename(&document.title, format, Local::now().naive_local());
        let path = write_export(&self.export_dir, &filename, rendered.as_bytes()).await?;
        info!(document_id = %id, path = %path.display(), "exported novel");
        Ok(ExportReceipt {
            message: format!("Exported to {}", path.display()),
            filepath: Some(path.to_string_lossy().to_string()),
        })
    }
}

/// `<title>_<timestamp>.<ext>`, keeping only alphanumeric title characters.
fn export_filename(title: &str, format: ExportFormat, now: NaiveDateTime) -> String {
    let sanitized: String = title.chars().filter(|ch| ch.is_alphanumeric()).collect();
    let sanitized = if sanitized.is_empty() {
        "Untitled".to_string()
    } else {
        sanitized
    };
    format!(
        "{sanitized}_{}.{}",
        now.format("%Y-%m-%dT%H-%M-%S"),
        format.as_str()
    )
}

fn render_txt(document: &Document, schema: &MetadataSchema) -> String {
    let mut out = format!("Title: {}\n\n", document.title);
    for field in schema.fields() {
        let value = document
            .metadata
            .get(&field.key)
            .map(String::as_str)
            .unwrap_or("");
        if !value.is_empty() {
            out.push_str(&format!("{}:\n{value}\n\n", field.label));
        }
    }
    out.push_str(&format!("Content:\n{}", document.content));
    out
}

fn render_json(document: &Document, schema: &MetadataSchema) -> TransportResult<String> {
    let mut object = Map::new();
    object.insert("title".to_string(), Value::from(document.title.clone()));
    object.insert("content".to_string(), Value::from(document.content.clone()));
    for field in schema.fields() {
        let value = document.metadata.get(&field.key).cloned().unwrap_or_default();
        object.insert(field.key.clone(), Value::from(value));
    }
    serde_json::to_string_pretty(&Value::Object(object))
        .map_err(|err| TransportError::Io(err.to_string()))
}

async fn write_export(dir: &Path, filename: &str, bytes: &[u8]) -> TransportResult<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let final_path = dir.join(filename);
    let tmp_path = dir.join(format!("{filename}.tmp"));
    tokio::fs::write(&tmp_path, bytes).await?;
    tokio::fs::rename(&tmp_path, &final_path).await?;
    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time should be monotonic")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "novel_workbench_{prefix}_{}_{}",
            std::process::id(),
            nanos
        ))
    }

    fn backend(dir: PathBuf) -> MemoryBackend {
        MemoryBackend::new(MetadataSchema::prompt_library_revision(), dir)
    }

    #[test]
    fn export_filename_keeps_alphanumerics_and_cjk() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|date| date.and_hms_opt(14, 5, 7))
            .expect("fixture date should be valid");
        assert_eq!(
            export_filename("Star: 星辰!", ExportFormat::Txt, now),
            "Star星辰_2024-03-09T14-05-07.txt"
        );
        assert_eq!(
            export_filename("?!", ExportFormat::Json, now),
            "Untitled_2024-03-09T14-05-07.json"
        );
    }

    #[tokio::test]
    async fn list_preserves_insertion_order_and_delete_removes() {
        let store = backend(temp_dir("order"));
        let first = DocumentStore::create(&store, "First").await.expect("create first");
        let second = DocumentStore::create(&store, "Second").await.expect("create second");

        let titles: Vec<_> = DocumentStore::list(&store)
            .await
            .expect("list")
            .into_iter()
            .map(|summary| summary.title)
            .collect();
        assert_eq!(titles, vec!["First", "Second"]);

        let receipt = DocumentStore::delete(&store, &first.id).await.expect("delete");
        assert_eq!(receipt.message.as_deref(), Some("Novel 'First' deleted"));
        let remaining = DocumentStore::list(&store).await.expect("list");
        assert_eq!(remaining, vec![second.summary()]);

        let missing = DocumentStore::delete(&store, &first.id).await;
        assert!(matches!(missing, Err(TransportError::NotFound(_))));
    }

    #[tokio::test]
    async fn update_overwrites_content_and_metadata() {
        let store = backend(temp_dir("update"));
        let novel = DocumentStore::create(&store, "Draft").await.expect("create");
        let mut metadata = DocumentMetadata::new();
        metadata.insert("characters".to_string(), "Ann".to_string());

        DocumentStore::update(
            &store,
            &novel.id,
            &DocumentUpdate {
                content: "It begins.".to_string(),
                metadata,
            },
        )
        .await
        .expect("update");

        let loaded = DocumentStore::get(&store, &novel.id).await.expect("get");
        assert_eq!(loaded.content, "It begins.");
        assert_eq!(loaded.metadata.get("characters").map(String::as_str), Some("Ann"));
        assert_eq!(loaded.metadata.get("knowledge").map(String::as_str), Some(""));
    }

    #[tokio::test]
    async fn character_update_keeps_id() {
        let store = backend(temp_dir("characters"));
        let created = CharacterLibrary::create(&store, &CharacterDraft::new("Ann", "pilot"))
            .await
            .expect("create character");
        let updated = CharacterLibrary::update(
            &store,
            &created.id,
            &CharacterDraft::new("Ann Vey", "captain"),
        )
        .await
        .expect("update character");

        assert_eq!(updated.id, created.id);
        let listed = CharacterLibrary::list(&store).await.expect("list characters");
        assert_eq!(listed, vec![updated.summary()]);
    }

    #[tokio::test]
    async fn exports_txt_with_labeled_sections() {
        let dir = temp_dir("export_txt");
        let store = backend(dir.clone());
        let novel = DocumentStore::create(&store, "Dune").await.expect("create");
        let mut metadata = DocumentMetadata::new();
        metadata.insert("characters".to_string(), "Paul".to_string());
        DocumentStore::update(
            &store,
            &novel.id,
            &DocumentUpdate {
                content: "Arrakis.".to_string(),
                metadata,
            },
        )
        .await
        .expect("update");

        let receipt = store
            .export(&novel.id, ExportFormat::Txt)
            .await
            .expect("txt export should succeed");
        let path = PathBuf::from(receipt.filepath.expect("export should report a path"));
        let text = std::fs::read_to_string(&path).expect("export file should exist");
        assert_eq!(text, "Title: Dune\n\nCharacters:\nPaul\n\nContent:\nArrakis.");

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn docx_export_is_unsupported_locally() {
        let store = backend(temp_dir("export_docx"));
        let novel = DocumentStore::create(&store, "Dune").await.expect("create");
        let result = store.export(&novel.id, ExportFormat::Docx).await;
        assert!(matches!(result, Err(TransportError::Unsupported(_))));
    }
}
