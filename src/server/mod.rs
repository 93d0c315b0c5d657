// HTTP surface: prediction form, training trigger, health and metrics

pub mod handlers;
pub mod router;
pub mod state;
pub mod templates;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config::ServerConfig;
use crate::jobs::{JobRunner, TrainingLauncher};
use crate::pipeline::ModelCache;

pub use router::app_router;
pub use state::AppState;

/// Build the shared state: one model cache, invalidated whenever a training job succeeds.
pub fn build_state(config: &ServerConfig, launcher: Arc<dyn TrainingLauncher>) -> AppState {
    let cache = Arc::new(ModelCache::new(config.model_file.clone()));
    let invalidate = Arc::clone(&cache);
    let jobs = JobRunner::new(launcher, config.training_timeout).on_success(move || invalidate.invalidate());
    AppState {
        cache,
        jobs,
        static_dir: config.static_dir.clone(),
    }
}

/// Bind and serve until the process is stopped.
pub async fn start_server(config: ServerConfig, launcher: Arc<dyn TrainingLauncher>) -> anyhow::Result<()> {
    let state = build_state(&config, launcher);
    let app = app_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("🚀 HTTP server running on http://{}", addr);
    info!("💚 Health check: http://{}/health", addr);
    info!("📈 Metrics:      http://{}/metrics", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
