//!
//! studyhall HTTP server
//! ---------------------
//! Axum-based JSON API in front of three external dependencies: the identity provider,
//! the relational store and the completion provider.
//!
//! Responsibilities:
//! - Signup/login/logout/me endpoints delegating to the `AuthProvider`.
//! - Bearer-token guard on every data route (`identity::require_auth`).
//! - Study set save/open/list/delete via `studysets`.
//! - Generation proxy, plain JSON and server-sent events.
//! - Health report of which clients were initialized.
//!
//! Client handles are built once in `AppState::from_config` and shared read-only
//! through router state; tests build `AppState` directly with fakes.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::completion::{CompletionProvider, OpenAiClient};
use crate::config::{Config, StoreBackend};
use crate::error::{AppError, AppResult};
use crate::identity::{require_auth, AuthProvider, SupabaseAuth};
use crate::storage::{MemoryStore, PgStore, RestStore, StudySetStore};

pub mod auth;
pub mod chat;
pub mod sets;

/// Shared server state injected into all handlers. Any client may be absent when its
/// credentials were not configured; dependent routes then answer 503.
#[derive(Clone, Default)]
pub struct AppState {
    pub auth: Option<Arc<dyn AuthProvider>>,
    pub store: Option<Arc<dyn StudySetStore>>,
    pub completions: Option<Arc<dyn CompletionProvider>>,
}

impl AppState {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("studyhall/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let auth: Option<Arc<dyn AuthProvider>> = match (cfg.supabase_url.as_deref(), cfg.supabase_key()) {
            (Some(url), Some(key)) => Some(Arc::new(SupabaseAuth::new(http.clone(), url, key))),
            _ => {
                warn!(target: "startup", "SUPABASE_URL / SUPABASE_KEY not set; authentication disabled");
                None
            }
        };

        let store: Option<Arc<dyn StudySetStore>> = match cfg.store_backend() {
            StoreBackend::Memory => Some(Arc::new(MemoryStore::new())),
            StoreBackend::Postgres { dsn } => Some(Arc::new(PgStore::new(&dsn)?)),
            StoreBackend::SupabaseRest => match (cfg.supabase_url.as_deref(), cfg.supabase_key()) {
                (Some(url), Some(key)) => Some(Arc::new(RestStore::new(http.clone(), url, key, cfg.uses_service_role()))),
                _ => None,
            },
            StoreBackend::None => {
                warn!(target: "startup", "no relational store configured; study set routes disabled");
                None
            }
        };

        let completions: Option<Arc<dyn CompletionProvider>> = match cfg.openai_api_key.as_deref() {
            Some(key) => Some(Arc::new(OpenAiClient::new(http, &cfg.openai_base_url, key, &cfg.openai_model))),
            None => {
                warn!(target: "startup", "OPENAI_API_KEY not set; generation routes disabled");
                None
            }
        };

        Ok(Self { auth, store, completions })
    }

    pub fn auth_provider(&self) -> AppResult<Arc<dyn AuthProvider>> {
        self.auth.clone().ok_or_else(|| AppError::unavailable("auth_unavailable", "Authentication service not initialized"))
    }

    pub fn study_store(&self) -> AppResult<Arc<dyn StudySetStore>> {
        self.store.clone().ok_or_else(|| AppError::unavailable("store_unavailable", "Database not initialized"))
    }

    pub fn completion_provider(&self) -> AppResult<Arc<dyn CompletionProvider>> {
        self.completions.clone().ok_or_else(|| AppError::unavailable("openai_unavailable", "OpenAI client not initialized"))
    }
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    openai_initialized: bool,
    supabase_initialized: bool,
    store_backend: Option<&'static str>,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy",
        openai_initialized: state.completions.is_some(),
        supabase_initialized: state.auth.is_some() && state.store.is_some(),
        store_backend: state.store.as_ref().map(|s| s.backend_name()),
    })
}

/// Build the full route table. Public routes are mounted beside a guarded sub-router.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/save", post(sets::save))
        .route("/open/{identifier}", get(sets::open))
        .route("/list-jsons", get(sets::list))
        .route("/delete/{identifier}", get(sets::delete))
        .route("/chat", get(chat::chat))
        .route("/chat/stream", get(chat::chat_stream))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/api/health", get(health))
        .route("/api/generation-options", get(chat::generation_options))
        .merge(protected)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(target: "startup", "ctrl-c handler failed: {}", e);
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => { s.recv().await; }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target: "startup", "shutdown requested");
}

/// Start the HTTP server and serve until Ctrl-C / SIGTERM. Client handles are dropped
/// when this returns.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&cfg)?;
    info!(
        target: "startup",
        "clients: openai={}, auth={}, store={}",
        state.completions.is_some(),
        state.auth.is_some(),
        state.store.as_ref().map(|s| s.backend_name()).unwrap_or("none")
    );
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", cfg.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    info!(target: "startup", "server stopped");
    Ok(())
}
