mod app;
mod event;
mod theme;

use app::WorkbenchApp;
use eframe::egui;
use novel_workbench::backend::http::HttpBackend;
use novel_workbench::backend::memory::MemoryBackend;
use novel_workbench::backend::ollama::OllamaClient;
use novel_workbench::backend::Services;
use novel_workbench::{BackendMode, Config, Workspace, WorkspaceOptions};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn build_services(config: &Config) -> Result<Services, Box<dyn std::error::Error>> {
    let services = match config.backend {
        BackendMode::Remote => Services::from_backend(Arc::new(HttpBackend::new(
            config.server_url.clone(),
        )?)),
        BackendMode::Local => {
            let store = MemoryBackend::new(config.metadata_schema.clone(), config.export_dir.clone());
            let llm = OllamaClient::new(config.ollama_url.clone())?;
            Services::split(Arc::new(store), Arc::new(llm))
        }
    };
    Ok(services)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "novel_workbench=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        backend = ?config.backend,
        server_url = %config.server_url,
        ollama_url = %config.ollama_url,
        "novel workbench starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("workbench-runtime")
        .build()?;

    let workspace = Arc::new(Workspace::new(
        build_services(&config)?,
        WorkspaceOptions {
            schema: config.metadata_schema.clone(),
            default_model: config.default_model.clone(),
        },
    ));
    let handle = runtime.handle().clone();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([960.0, 600.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Novel Workbench",
        native_options,
        Box::new(move |creation_context| {
            Ok(Box::new(WorkbenchApp::new(
                &creation_context.egui_ctx,
                workspace,
                handle,
            )))
        }),
    )?;

    drop(runtime);
    Ok(())
}
