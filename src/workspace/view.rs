use crate::novel::DocumentId;
use crate::workspace::compose::ToolKind;

/// The one panel visible at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Panel {
    #[default]
    Welcome,
    Editor(DocumentId),
    Tool(ToolKind),
    Library,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Welcome,
    Editor,
    Tool,
    Library,
}

impl Panel {
    pub fn kind(&self) -> PanelKind {
        match self {
            Self::Welcome => PanelKind::Welcome,
            Self::Editor(_) => PanelKind::Editor,
            Self::Tool(_) => PanelKind::Tool,
            Self::Library => PanelKind::Library,
        }
    }

    pub fn editor_document(&self) -> Option<&DocumentId> {
        match self {
            Self::Editor(id) => Some(id),
            _ => None,
        }
    }

    pub fn tool(&self) -> Option<&ToolKind> {
        match self {
            Self::Tool(kind) => Some(kind),
            _ => None,
        }
    }
}

/// What the result pane of the active panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultPane {
    Pending,
    Text(String),
    Failed(String),
}

/// Panel state machine. The result pane belongs to the panel that was active
/// when it was produced; every transition clears it.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    panel: Panel,
    result: Option<ResultPane>,
}

impl ViewState {
    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn result(&self) -> Option<&ResultPane> {
        self.result.as_ref()
    }

    pub fn open_document(&mut self, id: DocumentId) {
        self.enter(Panel::Editor(id));
    }

    pub fn select_tool(&mut self, kind: ToolKind) {
        self.enter(Panel::Tool(kind));
    }

    pub fn open_library(&mut self) {
        self.enter(Panel::Library);
    }

    /// Falls back to the welcome panel when the editor was showing `id`.
    /// Returns whether a transition happened.
    pub fn document_deleted(&mut self, id: &DocumentId) -> bool {
        if self.panel.editor_document() == Some(id) {
            self.enter(Panel::Welcome);
            true
        } else {
            false
        }
    }

    /// Sets the result pane only while `owner` is still the active panel.
    pub fn show_result(&mut self, owner: &Panel, result: ResultPane) -> bool {
        if &self.panel != owner {
            return false;
        }
        self.result = Some(result);
        true
    }

    fn enter(&mut self, panel: Panel) {
        self.panel = panel;
        self.result = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id)
    }

    #[test]
    fn starts_on_welcome_without_result() {
        let view = ViewState::default();
        assert_eq!(view.panel(), &Panel::Welcome);
        assert!(view.result().is_none());
    }

    #[test]
    fn leaving_the_editor_hides_its_result() {
        let mut view = ViewState::default();
        view.open_document(doc("a"));
        assert!(view.show_result(&Panel::Editor(doc("a")), ResultPane::Text("more".into())));

        view.select_tool(ToolKind::Outline);
        assert_eq!(view.panel().kind(), PanelKind::Tool);
        assert!(view.result().is_none());
    }

    #[test]
    fn result_for_another_panel_is_dropped() {
        let mut view = ViewState::default();
        view.open_document(doc("a"));
        view.open_library();

        assert!(!view.show_result(&Panel::Editor(doc("a")), ResultPane::Pending));
        assert!(view.result().is_none());
    }

    #[test]
    fn switching_documents_clears_the_previous_result() {
        let mut view = ViewState::default();
        view.open_document(doc("a"));
        view.show_result(&Panel::Editor(doc("a")), ResultPane::Failed("boom".into()));

        view.open_document(doc("b"));
        assert_eq!(view.panel().editor_document(), Some(&doc("b")));
        assert!(view.result().is_none());
    }

    #[test]
    fn deleting_the_edited_document_returns_to_welcome() {
        let mut view = ViewState::default();
        view.open_document(doc("a"));

        assert!(!view.document_deleted(&doc("b")));
        assert_eq!(view.panel().kind(), PanelKind::Editor);

        assert!(view.document_deleted(&doc("a")));
        assert_eq!(view.panel(), &Panel::Welcome);
    }

    #[test]
    fn deletion_outside_the_editor_keeps_the_panel() {
        let mut view = ViewState::default();
        view.select_tool(ToolKind::Title);
        assert!(!view.document_deleted(&doc("a")));
        assert_eq!(view.panel(), &Panel::Tool(ToolKind::Title));
    }
}
