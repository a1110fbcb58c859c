//! Workspace coordinator.
//!
//! [`Workspace`] owns every piece of mutable workbench state: the panel, the
//! loaded document with its metadata, both rosters, the model selection and
//! the character form. Intents are `&self` async methods. State is touched
//! only inside short critical sections that never span an await, and every
//! change is published as a [`WorkspaceSnapshot`] on a watch channel.

pub mod compose;
pub mod guard;
pub mod roster;
pub mod snapshot;
pub mod view;


use crate::backend::Services;
use crate::error::{ValidationError, WorkspaceError, WorkspaceResult};
use crate::novel::metadata::{MetadataSchema, MetadataStore, CHARACTERS_FIELD};
use crate::novel::{
    word_count, CharacterDraft, CharacterId, CharacterSummary, Document, DocumentId,
    DocumentSummary, DocumentUpdate, ExportFormat, ExportReceipt,
};
use compose::{ComposeInput, GenerationMode, ToolKind};
use guard::{SaveGuard, SavePermit};
use roster::{Roster, RosterChange};
use snapshot::{
    CharacterForm, DocumentView, MetadataEntry, ModelList, ModelsView, StatusLine,
    WorkspaceSnapshot, WorkspaceState,
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};
use view::{ResultPane, ViewState};

#[derive(Debug, Clone, Default)]
pub struct WorkspaceOptions {
    pub schema: MetadataSchema,
    /// Preselected once the model list arrives, if the list contains it.
    pub default_model: Option<String>,
}

struct LoadedDocument {
    id: DocumentId,
    title: String,
    content: String,
    metadata: MetadataStore,
}

struct Inner {
    view: ViewState,
    session: Option<LoadedDocument>,
    prompt: String,
    tool_input: String,
    documents: Roster<DocumentSummary>,
    characters: Roster<CharacterSummary>,
    models: ModelList,
    selected_model: Option<String>,
    character_form: CharacterForm,
    status: Option<StatusLine>,
    /// Incremented whenever the loaded document is replaced or unloaded.
    /// In-flight generations compare against it.
    load_epoch: u64,
    /// Incremented by every open request and every load or unload. An open
    /// response whose ticket is no longer current is dropped.
    open_ticket: u64,
    revision: u64,
    generating: usize,
}

impl Inner {
    fn new() -> Self {
        Self {
            view: ViewState::default(),
            session: None,
            prompt: String::new(),
            tool_input: String::new(),
            documents: Roster::default(),
            characters: Roster::default(),
            models: ModelList::Loading,
            selected_model: None,
            character_form: CharacterForm::default(),
            status: None,
            load_epoch: 0,
            open_ticket: 0,
            revision: 0,
            generating: 0,
        }
    }

    fn install(&mut self, document: Document, schema: &MetadataSchema) {
        let metadata = MetadataStore::from_metadata(schema.clone(), &document.metadata);
        self.view.open_document(document.id.clone());
        self.session = Some(LoadedDocument {
            id: document.id,
            title: document.title,
            content: document.content,
            metadata,
        });
        self.prompt.clear();
        self.load_epoch += 1;
        self.open_ticket += 1;
        self.revision += 1;
    }

    fn loaded_id(&self) -> Option<&DocumentId> {
        self.session.as_ref().map(|session| &session.id)
    }

    fn session_mut(&mut self) -> Result<&mut LoadedDocument, ValidationError> {
        self.session.as_mut().ok_or(ValidationError::NoDocumentOpen)
    }

    fn reset_character_form(&mut self) {
        self.character_form = CharacterForm::default();
        self.revision += 1;
    }

    fn info(&mut self, message: impl Into<String>) {
        self.status = Some(StatusLine::info(message));
    }
}

pub struct Workspace {
    services: Services,
    schema: MetadataSchema,
    default_model: Option<String>,
    guard: SaveGuard,
    state: Mutex<Inner>,
    updates: watch::Sender<WorkspaceSnapshot>,
}

impl Workspace {
    pub fn new(services: Services, options: WorkspaceOptions) -> Self {
        let guard = SaveGuard::default();
        let inner = Inner::new();
        let (updates, _) = watch::channel(build_snapshot(&inner, &guard));
        Self {
            services,
            schema: options.schema,
            default_model: options.default_model,
            guard,
            state: Mutex::new(inner),
            updates,
        }
    }

    pub fn schema(&self) -> &MetadataSchema {
        &self.schema
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkspaceSnapshot> {
        self.updates.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `change` under the state lock and publishes the result.
    fn update<R>(&self, change: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.lock();
        let out = change(&mut inner);
        self.updates.send_replace(build_snapshot(&inner, &self.guard));
        out
    }

    fn publish(&self) {
        self.update(|_| ());
    }

    /// Logs a failed intent, mirrors it on the status line and hands it back.
    fn reject(&self, operation: &'static str, err: impl Into<WorkspaceError>) -> WorkspaceError {
        let err = err.into();
        match &err {
            WorkspaceError::Transport(_) => warn!(operation, error = %err, "collaborator call failed"),
            _ => debug!(operation, error = %err, "intent rejected"),
        }
        let message = err.to_string();
        self.update(|inner| inner.status = Some(StatusLine::error(message)));
        err
    }

    /// Loads the model list and the document roster side by side.
    pub async fn initialize(&self) -> WorkspaceResult<()> {
        let (models, documents) = tokio::join!(self.refresh_models(), self.refresh_documents());
        models.and(documents)
    }

    pub async fn refresh_documents(&self) -> WorkspaceResult<()> {
        self.update(|inner| inner.documents.begin_loading());
        match self.services.documents.list().await {
            Ok(entries) => {
                debug!(count = entries.len(), "document roster loaded");
                self.update(|inner| inner.documents.replace(entries));
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.update(|inner| inner.documents.fail(message));
                Err(self.reject("list documents", err))
            }
        }
    }

    pub async fn refresh_characters(&self) -> WorkspaceResult<()> {
        self.update(|inner| inner.characters.begin_loading());
        match self.services.characters.list().await {
            Ok(entries) => {
                debug!(count = entries.len(), "character roster loaded");
                self.update(|inner| inner.characters.replace(entries));
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.update(|inner| inner.characters.fail(message));
                Err(self.reject("list characters", err))
            }
        }
    }

    pub async fn refresh_models(&self) -> WorkspaceResult<()> {
        self.update(|inner| inner.models = ModelList::Loading);
        match self.services.models.list_models().await {
            Ok(models) => {
                info!(count = models.len(), "model list loaded");
                self.update(|inner| {
                    let keep = inner
                        .selected_model
                        .take()
                        .filter(|selected| models.contains(selected));
                    inner.selected_model = keep.or_else(|| {
                        self.default_model
                            .clone()
                            .filter(|default| models.contains(default))
                    });
                    if models.is_empty() {
                        inner.info("No models available");
                    }
                    inner.models = ModelList::Ready(models);
                });
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                self.update(|inner| {
                    inner.models = ModelList::Failed(message);
                    inner.selected_model = None;
                });
                Err(self.reject("list models", err))
            }
        }
    }

    pub fn select_model(&self, name: &str) -> WorkspaceResult<()> {
        let selected = self.update(|inner| {
            let ModelList::Ready(models) = &inner.models else {
                return false;
            };
            if !models.iter().any(|model| model == name) {
                return false;
            }
            inner.selected_model = Some(name.to_string());
            true
        });
        if !selected {
            return Err(self.reject(
                "select model",
                ValidationError::UnknownModel(name.to_string()),
            ));
        }
        debug!(model = name, "model selected");
        Ok(())
    }

    /// Creates a document and opens it. A blank title does nothing.
    pub async fn create_document(&self, title: &str) -> WorkspaceResult<Option<DocumentId>> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(None);
        }
        self.guard
            .check_navigation()
            .map_err(|err| self.reject("create", err))?;

        info!(title, "creating document");
        let document = self
            .services
            .documents
            .create(title)
            .await
            .map_err(|err| self.reject("create", err))?;

        let id = document.id.clone();
        let refetch = self.update(|inner| {
            let patched = inner
                .documents
                .apply(RosterChange::Created(document.summary()));
            inner.info(format!("Created '{}'", document.title));
            inner.install(document, &self.schema);
            !patched
        });
        if refetch {
            let _ = self.refresh_documents().await;
        }
        Ok(Some(id))
    }

    /// Loads `id` into the editor. A response overtaken by a later open,
    /// create or unload is dropped.
    pub async fn open_document(&self, id: &DocumentId) -> WorkspaceResult<()> {
        self.guard
            .check_navigation()
            .map_err(|err| self.reject("open", err))?;

        let ticket = {
            let mut inner = self.lock();
            inner.open_ticket += 1;
            inner.open_ticket
        };
        debug!(document_id = %id, "opening document");

        let fetched = self.services.documents.get(id).await;
        let current = self.lock().open_ticket == ticket;
        if !current {
            debug!(document_id = %id, "discarding superseded open");
            return Ok(());
        }

        let document = fetched.map_err(|err| self.reject("open", err))?;
        self.update(|inner| {
            inner.info(format!("Opened '{}'", document.title));
            inner.install(document, &self.schema);
        });
        info!(document_id = %id, "document opened");
        Ok(())
    }

    pub fn edit_content(&self, content: impl Into<String>) -> WorkspaceResult<()> {
        let content = content.into();
        self.update(|inner| {
            inner.session_mut().map(|session| session.content = content)
        })
        .map_err(|err| self.reject("edit content", err))
    }

    pub fn edit_metadata(&self, key: &str, value: impl Into<String>) -> WorkspaceResult<()> {
        let value = value.into();
        self.update(|inner| {
            let session = inner.session_mut()?;
            if session.metadata.set(key, value) {
                Ok(())
            } else {
                Err(ValidationError::UnknownField(key.to_string()))
            }
        })
        .map_err(|err| self.reject("edit metadata", err))
    }

    pub fn edit_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        self.update(|inner| inner.prompt = prompt);
    }

    pub fn edit_tool_input(&self, input: impl Into<String>) {
        let input = input.into();
        self.update(|inner| inner.tool_input = input);
    }

    /// Writes the loaded document back to the store.
    ///
    /// Only one save runs at a time; an overlapping call returns
    /// [`WorkspaceError::SaveInProgress`] without contacting the store. On
    /// failure the local body and metadata are left as they were.
    pub async fn save(&self) -> WorkspaceResult<()> {
        let pending = {
            let inner = self.lock();
            inner.session.as_ref().map(|session| {
                (
                    session.id.clone(),
                    DocumentUpdate {
                        content: session.content.clone(),
                        metadata: session.metadata.to_metadata(),
                    },
                )
            })
        };
        let Some((id, update)) = pending else {
            return Err(self.reject("save", ValidationError::NoDocumentOpen));
        };
        let Some(permit) = self.guard.try_acquire() else {
            return Err(self.reject("save", WorkspaceError::SaveInProgress));
        };
        let permit = PublishedPermit {
            permit: Some(permit),
            workspace: self,
        };
        self.publish();

        info!(document_id = %id, "saving document");
        let saved = self.services.documents.update(&id, &update).await;
        drop(permit);

        match saved {
            Ok(()) => {
                self.update(|inner| inner.info("Saved"));
                info!(document_id = %id, "document saved");
                Ok(())
            }
            Err(err) => Err(self.reject("save", err)),
        }
    }

    /// Deletes a document. Unloads it when it is the loaded one and leaves
    /// the editor if the editor was showing it.
    pub async fn delete_document(&self, id: &DocumentId) -> WorkspaceResult<()> {
        self.guard
            .check_navigation()
            .map_err(|err| self.reject("delete", err))?;

        info!(document_id = %id, "deleting document");
        let receipt = self
            .services
            .documents
            .delete(id)
            .await
            .map_err(|err| self.reject("delete", err))?;

        let refetch = self.update(|inner| {
            let patched = inner.documents.apply(RosterChange::Deleted(id.clone()));
            if inner.loaded_id() == Some(id) {
                inner.session = None;
                inner.load_epoch += 1;
                inner.open_ticket += 1;
                inner.revision += 1;
            }
            inner.view.document_deleted(id);
            inner.info(receipt.message.unwrap_or_else(|| "Document deleted".to_string()));
            !patched
        });
        if refetch {
            let _ = self.refresh_documents().await;
        }
        Ok(())
    }

    /// Generates text for `mode`.
    ///
    /// Editor modes append the result to the loaded body, separated by a
    /// blank line when the body already has text. Tool mode only fills the
    /// tool's result pane. Results are not applied once the document or
    /// panel that asked for them has been replaced.
    pub async fn generate(&self, mode: GenerationMode, text: &str) -> WorkspaceResult<String> {
        let prepared = self.update(|inner| {
            if mode.targets_document() && inner.session.is_none() {
                return Err(ValidationError::NoDocumentOpen);
            }
            let blank = MetadataStore::new(self.schema.clone());
            let (metadata, body) = match &inner.session {
                Some(session) => (&session.metadata, session.content.as_str()),
                None => (&blank, ""),
            };
            let request = compose::compose(
                &mode,
                ComposeInput {
                    metadata,
                    user_text: text,
                    body,
                    model: inner.selected_model.as_deref(),
                },
            )?;

            let owner = inner.view.panel().clone();
            let target = if mode.targets_document() {
                inner.loaded_id().cloned()
            } else {
                None
            };
            inner.view.show_result(&owner, ResultPane::Pending);
            inner.generating += 1;
            inner.info("Generating...");
            Ok((request, owner, target, inner.load_epoch))
        });
        let (request, owner, target, epoch) =
            prepared.map_err(|err| self.reject("generate", err))?;

        info!(model = %request.model, mode = ?mode, "generating text");
        let outcome = self
            .services
            .generator
            .generate(&request.model, &request.prompt)
            .await;

        let result = match &outcome {
            Ok(text) => ResultPane::Text(text.clone()),
            Err(err) => ResultPane::Failed(err.to_string()),
        };
        let applied = self.update(|inner| {
            inner.generating = inner.generating.saturating_sub(1);
            inner.view.show_result(&owner, result);
            let Ok(generated) = &outcome else {
                return false;
            };
            let Some(target) = &target else {
                inner.info("Generation finished");
                return true;
            };
            if inner.load_epoch != epoch || inner.loaded_id() != Some(target) {
                return false;
            }
            if let Some(session) = inner.session.as_mut() {
                append_generated(&mut session.content, generated);
            }
            inner.revision += 1;
            inner.info("Generation finished");
            true
        });

        match outcome {
            Ok(text) => {
                if !applied {
                    debug!(model = %request.model, "discarding generation for a replaced document");
                }
                Ok(text)
            }
            Err(err) => Err(self.reject("generate", err)),
        }
    }

    pub fn select_tool(&self, kind: ToolKind) {
        debug!(tool = %kind, "tool selected");
        self.update(|inner| {
            inner.view.select_tool(kind);
            inner.tool_input.clear();
            inner.revision += 1;
        });
    }

    /// Shows the character library with an empty form and a fresh roster.
    pub async fn open_library(&self) -> WorkspaceResult<()> {
        self.update(|inner| {
            inner.view.open_library();
            inner.reset_character_form();
        });
        self.refresh_characters().await
    }

    /// Returns to the loaded document without refetching it.
    pub fn resume_editor(&self) -> WorkspaceResult<()> {
        self.update(|inner| {
            let id = inner.loaded_id().cloned().ok_or(ValidationError::NoDocumentOpen)?;
            inner.view.open_document(id);
            Ok(())
        })
        .map_err(|err: ValidationError| self.reject("resume editor", err))
    }

    /// Loads a library character into the form for editing.
    pub async fn edit_character(&self, id: &CharacterId) -> WorkspaceResult<()> {
        let character = self
            .services
            .characters
            .get(id)
            .await
            .map_err(|err| self.reject("load character", err))?;
        self.update(|inner| {
            inner.character_form = CharacterForm {
                editing: Some(character.id),
                draft: CharacterDraft::new(character.name, character.description),
            };
            inner.revision += 1;
        });
        Ok(())
    }

    pub fn set_character_draft(&self, draft: CharacterDraft) {
        self.update(|inner| inner.character_form.draft = draft);
    }

    pub fn clear_character_form(&self) {
        self.update(Inner::reset_character_form);
    }

    /// Creates or updates the character in the form, then clears the form.
    pub async fn save_character(&self) -> WorkspaceResult<CharacterId> {
        let form = self.lock().character_form.clone();
        if !form.draft.is_complete() {
            return Err(self.reject("save character", ValidationError::BlankCharacter));
        }
        let draft = CharacterDraft::new(form.draft.name.trim(), form.draft.description.trim());

        let saved = match &form.editing {
            Some(id) => self.services.characters.update(id, &draft).await,
            None => self.services.characters.create(&draft).await,
        };
        let character = saved.map_err(|err| self.reject("save character", err))?;
        let change = match form.editing {
            Some(_) => RosterChange::Updated(character.summary()),
            None => RosterChange::Created(character.summary()),
        };
        info!(character_id = %character.id, name = %character.name, "character saved");

        let refetch = self.update(|inner| {
            let patched = inner.characters.apply(change);
            inner.reset_character_form();
            inner.info(format!("Saved character '{}'", character.name));
            !patched
        });
        if refetch {
            let _ = self.refresh_characters().await;
        }
        Ok(character.id)
    }

    pub async fn delete_character(&self, id: &CharacterId) -> WorkspaceResult<()> {
        info!(character_id = %id, "deleting character");
        let receipt = self
            .services
            .characters
            .delete(id)
            .await
            .map_err(|err| self.reject("delete character", err))?;

        let refetch = self.update(|inner| {
            let patched = inner.characters.apply(RosterChange::Deleted(id.clone()));
            if inner.character_form.editing.as_ref() == Some(id) {
                inner.reset_character_form();
            }
            inner.info(receipt.message.unwrap_or_else(|| "Character deleted".to_string()));
            !patched
        });
        if refetch {
            let _ = self.refresh_characters().await;
        }
        Ok(())
    }

    /// Copies the character in the form into the loaded document's
    /// characters field.
    pub fn attach_character_to_document(&self) -> WorkspaceResult<()> {
        self.update(|inner| {
            let draft = inner.character_form.draft.clone();
            let session = inner.session_mut()?;
            if !draft.is_complete() {
                return Err(ValidationError::BlankCharacter);
            }
            if !session.metadata.append_block(CHARACTERS_FIELD, &draft.to_attachment()) {
                return Err(ValidationError::UnknownField(CHARACTERS_FIELD.to_string()));
            }
            inner.revision += 1;
            inner.info(format!("Attached '{}'", draft.name.trim()));
            Ok(())
        })
        .map_err(|err| self.reject("attach character", err))
    }

    pub async fn export(&self, format: ExportFormat) -> WorkspaceResult<ExportReceipt> {
        let id = self.lock().loaded_id().cloned();
        let Some(id) = id else {
            return Err(self.reject("export", ValidationError::NoDocumentOpen));
        };

        info!(document_id = %id, %format, "exporting document");
        let receipt = self
            .services
            .exporter
            .export(&id, format)
            .await
            .map_err(|err| self.reject("export", err))?;

        let message = if receipt.message.is_empty() {
            format!("Exported as {format}")
        } else {
            receipt.message.clone()
        };
        self.update(|inner| inner.info(message));
        Ok(receipt)
    }
}

/// Releases the save guard and republishes, so observers see `saving` clear
/// even when the save future is dropped mid-flight.
struct PublishedPermit<'a> {
    permit: Option<SavePermit<'a>>,
    workspace: &'a Workspace,
}

impl Drop for PublishedPermit<'_> {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.workspace.publish();
    }
}

fn append_generated(body: &mut String, generated: &str) {
    let generated = generated.trim();
    if generated.is_empty() {
        return;
    }
    if !body.trim().is_empty() {
        body.push_str("\n\n");
    }
    body.push_str(generated);
}

fn build_snapshot(inner: &Inner, guard: &SaveGuard) -> WorkspaceSnapshot {
    let panel = inner.view.panel().clone();
    let document = inner.session.as_ref().map(|session| DocumentView {
        id: session.id.clone(),
        title: session.title.clone(),
        content: session.content.clone(),
        metadata: session
            .metadata
            .schema()
            .fields()
            .iter()
            .map(|field| MetadataEntry {
                key: field.key.clone(),
                label: field.label.clone(),
                value: session.metadata.get(&field.key).to_string(),
            })
            .collect(),
        word_count: word_count(&session.content),
    });

    WorkspaceSnapshot {
        state: WorkspaceState {
            open_document_id: panel.editor_document().cloned(),
            active_panel: panel.kind(),
            active_tool: panel.tool().cloned(),
            saving: guard.is_busy(),
        },
        document,
        revision: inner.revision,
        prompt: inner.prompt.clone(),
        tool_input: inner.tool_input.clone(),
        result: inner.view.result().cloned(),
        documents: inner.documents.view(),
        characters: inner.characters.view(),
        models: ModelsView {
            list: inner.models.clone(),
            selected: inner.selected_model.clone(),
        },
        character_form: inner.character_form.clone(),
        status: inner.status.clone(),
        generating: inner.generating > 0,
        panel,
    }
}
