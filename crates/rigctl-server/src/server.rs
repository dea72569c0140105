use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use librigctl::{CommandInterpreter, SessionRegistry};
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tracing::info;

use crate::config::ServerConfig;
use crate::ws;

/// Shared per-process state handed to every connection.
pub struct AppState {
    pub interpreter: CommandInterpreter,
    pub max_message_bytes: usize,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(
            Arc::clone(&config.schema),
            config.name.clone(),
        ));
        let interpreter = CommandInterpreter::new(registry, config.key.clone())
            .with_default_test(config.default_test.clone());
        Self {
            interpreter,
            max_message_bytes: config.max_message_bytes,
        }
    }
}

pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    match &config.static_dir {
        Some(dir) => {
            info!(dir = %dir.display(), "serving static files");
            app.fallback_service(ServeDir::new(dir))
        }
        None => app,
    }
}

/// Serve `app` on an already bound listener until the process exits.
pub async fn serve(listener: TcpListener, app: Router) -> Result<()> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind listener on {address}"))?;

    let state = Arc::new(AppState::new(&config));
    let app = router(state, &config);

    info!(name = %config.name, fields = config.schema.len(), "running on {address}");
    serve(listener, app).await
}
