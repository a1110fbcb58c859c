pub mod backend;
pub mod config;
pub mod error;
pub mod novel;
pub mod workspace;

pub use config::{BackendMode, Config};
pub use error::{TransportError, ValidationError, WorkspaceError, WorkspaceResult};
pub use workspace::{Workspace, WorkspaceOptions};
