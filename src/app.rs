//! Application state and the HTTP router.

use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::accounts::{AccountManager, account_routes};
use crate::applications::{ApplicationManager, application_routes};
use crate::chat::{ChatManager, chat_routes};
use crate::codes::code_routes;
use crate::config::AppConfig;
use crate::error::Result;
use crate::jobs::{JobManager, job_routes};
use crate::locations::location_routes;
use crate::store::{Database, LibSqlBackend};
use crate::suggestions::{Classifier, suggestion_routes};

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn Database>,
    pub config: Arc<AppConfig>,
    pub classifier: Arc<Classifier>,
    pub accounts: Arc<AccountManager>,
    pub jobs: Arc<JobManager>,
    pub applications: Arc<ApplicationManager>,
    pub chat: Arc<ChatManager>,
}

impl AppState {
    pub fn new(db: Arc<dyn Database>, config: AppConfig, classifier: Classifier) -> Self {
        let classifier = Arc::new(classifier);
        Self {
            accounts: Arc::new(AccountManager::new(Arc::clone(&db), config.session_ttl)),
            jobs: Arc::new(JobManager::new(Arc::clone(&db), Arc::clone(&classifier))),
            applications: Arc::new(ApplicationManager::new(Arc::clone(&db))),
            chat: Arc::new(ChatManager::new(
                Arc::clone(&db),
                config.chat_poll_interval_secs,
            )),
            config: Arc::new(config),
            classifier,
            db,
        }
    }
}

/// Build the full router: every API module, `/health`, tracing and CORS.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        .merge(account_routes())
        .merge(location_routes())
        .merge(code_routes())
        .merge(job_routes())
        .merge(application_routes())
        .merge(chat_routes())
        .merge(suggestion_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "minna-hiraizumi"
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    layer.allow_origin(allowed)
}

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// Open the database, start background tasks and serve until Ctrl-C.
pub async fn serve(config: AppConfig) -> Result<()> {
    config.validate()?;
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    let addr = config.listen_addr();
    let state = AppState::new(db, config, Classifier::default_rules());
    spawn_session_pruner(Arc::clone(&state.accounts));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "HTTP server started");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

fn spawn_session_pruner(accounts: Arc<AccountManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PRUNE_INTERVAL);
        loop {
            ticker.tick().await;
            if let Err(e) = accounts.prune_expired_sessions().await {
                tracing::warn!(error = %e, "Session prune failed");
            }
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
    }
}
