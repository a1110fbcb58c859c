use crate::event::AppEvent;
use crate::theme::Theme;
use eframe::egui::{self, RichText, ScrollArea};
use novel_workbench::novel::{CharacterDraft, CharacterId, DocumentId, DocumentSummary, ExportFormat};
use novel_workbench::workspace::compose::{GenerationMode, ToolKind};
use novel_workbench::workspace::roster::RosterView;
use novel_workbench::workspace::snapshot::{ModelList, WorkspaceSnapshot};
use novel_workbench::workspace::view::{Panel, ResultPane};
use novel_workbench::{Workspace, WorkspaceResult};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

/// Something the user asked for during a frame, run once rendering is done.
enum Action {
    RefreshDocuments,
    RefreshModels,
    SelectModel(String),
    CreateDocument(String),
    OpenDocument(DocumentId),
    DeleteDocument(DocumentId),
    Save,
    Generate(GenerationMode, String),
    SelectTool(ToolKind),
    OpenLibrary,
    ResumeEditor,
    EditCharacter(CharacterId),
    SaveCharacter,
    DeleteCharacter(CharacterId),
    ClearCharacterForm,
    AttachCharacter,
    Export(ExportFormat),
}

pub struct WorkbenchApp {
    workspace: Arc<Workspace>,
    runtime: Handle,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
    theme: Theme,
    snapshot: WorkspaceSnapshot,
    synced_revision: Option<u64>,
    content: String,
    metadata: BTreeMap<String, String>,
    prompt: String,
    tool_input: String,
    character_name: String,
    character_description: String,
    new_title: Option<String>,
    pending_delete: Option<DocumentSummary>,
    diagnostics_log: Vec<String>,
    actions: Vec<Action>,
}

impl WorkbenchApp {
    pub fn new(ctx: &egui::Context, workspace: Arc<Workspace>, runtime: Handle) -> Self {
        let theme = Theme::default();
        theme.apply_visuals(ctx);

        let mut updates = workspace.subscribe();
        let repaint = ctx.clone();
        runtime.spawn(async move {
            while updates.changed().await.is_ok() {
                repaint.request_repaint();
            }
        });

        let (tx, rx) = mpsc::channel();
        let snapshot = workspace.snapshot();
        let app = Self {
            workspace,
            runtime,
            tx,
            rx,
            theme,
            snapshot,
            synced_revision: None,
            content: String::new(),
            metadata: BTreeMap::new(),
            prompt: String::new(),
            tool_input: String::new(),
            character_name: String::new(),
            character_description: String::new(),
            new_title: None,
            pending_delete: None,
            diagnostics_log: Vec::new(),
            actions: Vec::new(),
        };
        app.spawn_intent("initialize", |workspace| async move { workspace.initialize().await });
        app
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.diagnostics_log.push(format!("[{stamp}] {}", message.into()));
    }

    /// Runs an intent on the runtime and reports its outcome as an event.
    fn spawn_intent<F, Fut>(&self, intent: &'static str, run: F)
    where
        F: FnOnce(Arc<Workspace>) -> Fut,
        Fut: Future<Output = WorkspaceResult<()>> + Send + 'static,
    {
        let work = run(self.workspace.clone());
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let event = match work.await {
                Ok(()) => AppEvent::IntentFinished { intent },
                Err(error) => AppEvent::IntentFailed { intent, error },
            };
            let _ = tx.send(event);
        });
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::IntentFinished { intent } => debug!(intent, "intent finished"),
            AppEvent::IntentFailed { intent, error } if error.is_concurrency_rejection() => {
                self.log_diagnostic(format!("{intent} skipped: save in progress"));
            }
            AppEvent::IntentFailed { intent, error } => {
                self.log_diagnostic(format!("{intent} failed: {error}"));
            }
        }
    }

    /// Copies workspace-owned text into the edit buffers when the workspace
    /// rewrote it, leaving in-progress typing alone otherwise.
    fn sync_buffers(&mut self) {
        if self.synced_revision == Some(self.snapshot.revision) {
            return;
        }
        self.synced_revision = Some(self.snapshot.revision);
        match &self.snapshot.document {
            Some(document) => {
                self.content = document.content.clone();
                self.metadata = document
                    .metadata
                    .iter()
                    .map(|entry| (entry.key.clone(), entry.value.clone()))
                    .collect();
            }
            None => {
                self.content.clear();
                self.metadata.clear();
            }
        }
        self.prompt = self.snapshot.prompt.clone();
        self.tool_input = self.snapshot.tool_input.clone();
        self.character_name = self.snapshot.character_form.draft.name.clone();
        self.character_description = self.snapshot.character_form.draft.description.clone();
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::RefreshDocuments => {
                self.spawn_intent("refresh documents", |ws| async move {
                    ws.refresh_documents().await
                });
            }
            Action::RefreshModels => {
                self.spawn_intent("refresh models", |ws| async move { ws.refresh_models().await });
            }
            Action::SelectModel(name) => {
                if let Err(err) = self.workspace.select_model(&name) {
                    self.log_diagnostic(format!("select model failed: {err}"));
                }
            }
            Action::CreateDocument(title) => {
                self.spawn_intent("create", |ws| async move {
                    ws.create_document(&title).await.map(|_| ())
                });
            }
            Action::OpenDocument(id) => {
                self.spawn_intent("open", |ws| async move { ws.open_document(&id).await });
            }
            Action::DeleteDocument(id) => {
                self.spawn_intent("delete", |ws| async move { ws.delete_document(&id).await });
            }
            Action::Save => {
                self.spawn_intent("save", |ws| async move { ws.save().await });
            }
            Action::Generate(mode, text) => {
                self.spawn_intent("generate", |ws| async move {
                    ws.generate(mode, &text).await.map(|_| ())
                });
            }
            Action::SelectTool(kind) => {
                self.workspace.select_tool(kind);
            }
            Action::OpenLibrary => {
                self.spawn_intent("open library", |ws| async move { ws.open_library().await });
            }
            Action::ResumeEditor => {
                if let Err(err) = self.workspace.resume_editor() {
                    self.log_diagnostic(format!("resume editor failed: {err}"));
                }
            }
            Action::EditCharacter(id) => {
                self.spawn_intent("edit character", |ws| async move {
                    ws.edit_character(&id).await
                });
            }
            Action::SaveCharacter => {
                self.spawn_intent("save character", |ws| async move {
                    ws.save_character().await.map(|_| ())
                });
            }
            Action::DeleteCharacter(id) => {
                self.spawn_intent("delete character", |ws| async move {
                    ws.delete_character(&id).await
                });
            }
            Action::ClearCharacterForm => self.workspace.clear_character_form(),
            Action::AttachCharacter => {
                if let Err(err) = self.workspace.attach_character_to_document() {
                    self.log_diagnostic(format!("attach character failed: {err}"));
                }
            }
            Action::Export(format) => {
                self.spawn_intent("export", move |ws| async move {
                    ws.export(format).await.map(|_| ())
                });
            }
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let frame = egui::Frame::new()
            .fill(self.theme.surface_0)
            .inner_margin(egui::Margin::symmetric(Theme::PADDING, 8));
        egui::TopBottomPanel::top("top_bar").frame(frame).show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong(RichText::new("Novel Workbench").color(self.theme.accent));
                ui.separator();

                match &self.snapshot.models.list {
                    ModelList::Loading => {
                        ui.spinner();
                        ui.label("Loading models...");
                    }
                    ModelList::Failed(message) => {
                        ui.label(RichText::new(format!("Models unavailable: {message}")).color(self.theme.danger));
                        if ui.button("Retry").clicked() {
                            self.actions.push(Action::RefreshModels);
                        }
                    }
                    ModelList::Ready(models) if models.is_empty() => {
                        ui.label(RichText::new("No models available").color(self.theme.text_muted));
                    }
                    ModelList::Ready(models) => {
                        let selected = self.snapshot.models.selected.clone();
                        egui::ComboBox::from_id_salt("model_picker")
                            .selected_text(selected.as_deref().unwrap_or("Select a model"))
                            .show_ui(ui, |ui| {
                                for model in models {
                                    let is_selected = selected.as_deref() == Some(model.as_str());
                                    if ui.selectable_label(is_selected, model).clicked() {
                                        self.actions.push(Action::SelectModel(model.clone()));
                                    }
                                }
                            });
                    }
                }

                ui.separator();
                if self.snapshot.state.saving {
                    ui.spinner();
                    ui.label("Saving...");
                } else if self.snapshot.generating {
                    ui.spinner();
                    ui.label("Generating...");
                }
                if let Some(status) = &self.snapshot.status {
                    ui.label(RichText::new(&status.message).color(self.theme.status_color(status.level)));
                }
            });
        });
    }

    fn render_left_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("novels_panel")
            .resizable(true)
            .default_width(240.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Novels");
                    if ui.small_button("+ New").clicked() {
                        self.new_title = Some(String::new());
                    }
                });
                ui.separator();

                let loaded = self.snapshot.document.as_ref().map(|document| document.id.clone());
                ScrollArea::vertical()
                    .id_salt("novel_roster")
                    .max_height(ui.available_height() * 0.5)
                    .show(ui, |ui| match &self.snapshot.documents {
                        RosterView::Loading => {
                            ui.spinner();
                        }
                        RosterView::Failed(message) => {
                            ui.label(RichText::new(message).color(self.theme.danger));
                            if ui.button("Retry").clicked() {
                                self.actions.push(Action::RefreshDocuments);
                            }
                        }
                        RosterView::Empty => {
                            ui.label(RichText::new("No novels yet").color(self.theme.text_muted));
                        }
                        RosterView::Entries(entries) => {
                            for entry in entries {
                                ui.horizontal(|ui| {
                                    let current = loaded.as_ref() == Some(&entry.id);
                                    if ui.selectable_label(current, &entry.title).clicked() {
                                        self.actions.push(Action::OpenDocument(entry.id.clone()));
                                    }
                                    if ui.small_button("Delete").clicked() {
                                        self.pending_delete = Some(entry.clone());
                                    }
                                });
                            }
                        }
                    });

                ui.separator();
                ui.strong("Tools");
                for kind in ToolKind::BUILTIN {
                    let active = self.snapshot.state.active_tool.as_ref() == Some(&kind);
                    if ui.selectable_label(active, kind.display_name()).clicked() {
                        self.actions.push(Action::SelectTool(kind));
                    }
                }
                let in_library = self.snapshot.panel == Panel::Library;
                if ui.selectable_label(in_library, "Character library").clicked() {
                    self.actions.push(Action::OpenLibrary);
                }
                if loaded.is_some() && self.snapshot.state.open_document_id.is_none() {
                    ui.separator();
                    if ui.button("Back to editor").clicked() {
                        self.actions.push(Action::ResumeEditor);
                    }
                }

                ui.separator();
                egui::CollapsingHeader::new("Diagnostics")
                    .default_open(false)
                    .show(ui, |ui| {
                        ScrollArea::vertical()
                            .id_salt("diagnostics_log")
                            .max_height(120.0)
                            .stick_to_bottom(true)
                            .show(ui, |ui| {
                                for entry in &self.diagnostics_log {
                                    ui.label(RichText::new(entry).small());
                                }
                            });
                    });
            });
    }

    fn render_center_panel(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| match self.snapshot.panel.clone() {
            Panel::Welcome => {
                ui.vertical_centered(|ui| {
                    ui.add_space(ui.available_height() * 0.3);
                    ui.heading("Welcome");
                    ui.label(
                        RichText::new("Create a novel or pick one from the list to start writing.")
                            .color(self.theme.text_muted),
                    );
                });
            }
            Panel::Editor(_) => self.render_editor(ui),
            Panel::Tool(kind) => self.render_tool(ui, &kind),
            Panel::Library => self.render_library(ui),
        });
    }

    fn render_editor(&mut self, ui: &mut egui::Ui) {
        let Some(document) = self.snapshot.document.clone() else {
            return;
        };
        let busy = self.snapshot.state.saving || self.snapshot.generating;

        ui.horizontal(|ui| {
            ui.heading(&document.title);
            ui.label(
                RichText::new(format!("{} characters", document.word_count)).color(self.theme.text_muted),
            );
        });
        ui.separator();

        ScrollArea::vertical().id_salt("editor_scroll").show(ui, |ui| {
            egui::CollapsingHeader::new("Story notes")
                .default_open(true)
                .show(ui, |ui| {
                    for entry in &document.metadata {
                        ui.label(&entry.label);
                        let value = self.metadata.entry(entry.key.clone()).or_default();
                        let response = ui.add(
                            egui::TextEdit::multiline(value)
                                .desired_rows(3)
                                .desired_width(f32::INFINITY),
                        );
                        if response.changed() {
                            let _ = self.workspace.edit_metadata(&entry.key, value.clone());
                        }
                    }
                });

            ui.label("Text");
            let response = ui.add(
                egui::TextEdit::multiline(&mut self.content)
                    .desired_rows(18)
                    .desired_width(f32::INFINITY),
            );
            if response.changed() {
                let _ = self.workspace.edit_content(self.content.clone());
            }

            ui.separator();
            let response = ui.add(
                egui::TextEdit::multiline(&mut self.prompt)
                    .desired_rows(2)
                    .desired_width(f32::INFINITY)
                    .hint_text("Writing prompt..."),
            );
            if response.changed() {
                self.workspace.edit_prompt(self.prompt.clone());
            }

            ui.horizontal(|ui| {
                if ui.add_enabled(!busy, egui::Button::new("Generate")).clicked() {
                    self.actions
                        .push(Action::Generate(GenerationMode::FreshPrompt, self.prompt.clone()));
                }
                if ui.add_enabled(!busy, egui::Button::new("Continue writing")).clicked() {
                    self.actions.push(Action::Generate(GenerationMode::Continuation, String::new()));
                }
                ui.separator();
                if ui.add_enabled(!self.snapshot.state.saving, egui::Button::new("Save")).clicked() {
                    self.actions.push(Action::Save);
                }
                ui.separator();
                for format in ExportFormat::ALL {
                    if ui.button(format!("Export {format}")).clicked() {
                        self.actions.push(Action::Export(format));
                    }
                }
            });

            self.render_result(ui);
        });
    }

    fn render_tool(&mut self, ui: &mut egui::Ui, kind: &ToolKind) {
        ui.heading(kind.display_name());
        ui.separator();

        let response = ui.add(
            egui::TextEdit::multiline(&mut self.tool_input)
                .desired_rows(5)
                .desired_width(f32::INFINITY)
                .hint_text(kind.input_hint()),
        );
        if response.changed() {
            self.workspace.edit_tool_input(self.tool_input.clone());
        }

        let busy = self.snapshot.generating;
        if ui.add_enabled(!busy, egui::Button::new("Generate")).clicked() {
            self.actions.push(Action::Generate(
                GenerationMode::Tool(kind.clone()),
                self.tool_input.clone(),
            ));
        }
        ui.separator();
        ScrollArea::vertical()
            .id_salt("tool_result")
            .show(ui, |ui| self.render_result(ui));
    }

    fn render_result(&self, ui: &mut egui::Ui) {
        match &self.snapshot.result {
            None => {}
            Some(ResultPane::Pending) => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.label("Waiting for the model...");
                });
            }
            Some(ResultPane::Text(text)) => {
                self.theme.card_frame().show(ui, |ui| {
                    ui.label(text);
                });
            }
            Some(ResultPane::Failed(message)) => {
                ui.label(RichText::new(message).color(self.theme.danger));
            }
        }
    }

    fn render_library(&mut self, ui: &mut egui::Ui) {
        ui.heading("Character library");
        ui.separator();

        ui.columns(2, |columns| {
            let ui = &mut columns[0];
            match &self.snapshot.characters {
                RosterView::Loading => {
                    ui.spinner();
                }
                RosterView::Failed(message) => {
                    ui.label(RichText::new(message).color(self.theme.danger));
                }
                RosterView::Empty => {
                    ui.label(RichText::new("No characters yet").color(self.theme.text_muted));
                }
                RosterView::Entries(entries) => {
                    for entry in entries {
                        ui.horizontal(|ui| {
                            ui.label(&entry.name);
                            if ui.small_button("Edit").clicked() {
                                self.actions.push(Action::EditCharacter(entry.id.clone()));
                            }
                            if ui.small_button("Delete").clicked() {
                                self.actions.push(Action::DeleteCharacter(entry.id.clone()));
                            }
                        });
                    }
                }
            }

            let ui = &mut columns[1];
            let editing = self.snapshot.character_form.editing.is_some();
            ui.strong(if editing { "Edit character" } else { "New character" });
            let name = ui.add(egui::TextEdit::singleline(&mut self.character_name).hint_text("Name"));
            let description = ui.add(
                egui::TextEdit::multiline(&mut self.character_description)
                    .desired_rows(6)
                    .hint_text("Description"),
            );
            if name.changed() || description.changed() {
                self.workspace.set_character_draft(CharacterDraft::new(
                    self.character_name.clone(),
                    self.character_description.clone(),
                ));
            }
            ui.horizontal(|ui| {
                if ui.button("Save").clicked() {
                    self.actions.push(Action::SaveCharacter);
                }
                if ui.button("Clear").clicked() {
                    self.actions.push(Action::ClearCharacterForm);
                }
                let loaded = self.snapshot.document.is_some();
                if ui.add_enabled(loaded, egui::Button::new("Attach to novel")).clicked() {
                    self.actions.push(Action::AttachCharacter);
                }
            });
        });
    }

    fn render_dialogs(&mut self, ctx: &egui::Context) {
        if let Some(title) = self.new_title.as_mut() {
            let mut close = false;
            egui::Window::new("New novel")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    let response = ui.add(egui::TextEdit::singleline(title).hint_text("Title"));
                    let submitted =
                        response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
                    ui.horizontal(|ui| {
                        let create = ui
                            .add_enabled(!title.trim().is_empty(), egui::Button::new("Create"))
                            .clicked();
                        if (create || submitted) && !title.trim().is_empty() {
                            self.actions.push(Action::CreateDocument(title.clone()));
                            close = true;
                        }
                        if ui.button("Cancel").clicked() {
                            close = true;
                        }
                    });
                });
            if close {
                self.new_title = None;
            }
        }

        if let Some(target) = self.pending_delete.clone() {
            let mut close = false;
            egui::Window::new("Delete novel")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .show(ctx, |ui| {
                    ui.label(format!("Delete '{}'? This cannot be undone.", target.title));
                    ui.horizontal(|ui| {
                        if ui.button(RichText::new("Delete").color(self.theme.danger)).clicked() {
                            self.actions.push(Action::DeleteDocument(target.id.clone()));
                            close = true;
                        }
                        if ui.button("Cancel").clicked() {
                            close = true;
                        }
                    });
                });
            if close {
                self.pending_delete = None;
            }
        }
    }
}

impl eframe::App for WorkbenchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.snapshot = self.workspace.snapshot();
        self.sync_buffers();

        self.render_top_bar(ctx);
        self.render_left_panel(ctx);
        self.render_center_panel(ctx);
        self.render_dialogs(ctx);

        for action in std::mem::take(&mut self.actions) {
            self.dispatch(action);
        }
    }
}
