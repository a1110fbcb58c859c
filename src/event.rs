use novel_workbench::error::WorkspaceError;

/// Outcome of an intent that ran on the runtime, reported back to the UI
/// thread. Workspace state itself arrives through snapshots.
#[derive(Debug, Clone)]
pub enum AppEvent {
    IntentFinished {
        intent: &'static str,
    },
    IntentFailed {
        intent: &'static str,
        error: WorkspaceError,
    },
}
