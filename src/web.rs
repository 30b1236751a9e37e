use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use include_dir::{include_dir, Dir};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::db::{call_blocking, Resource, StoredMessage, User};
use crate::error::HopeBotError;
use crate::llm_types::DistressLevel;
use crate::resource::ResourceIcon;
use crate::runtime::AppState;

mod auth;
mod error;
mod messages;
mod middleware;
mod resources;
use self::error::{ApiError, FieldError};
use middleware::*;

static WEB_ASSETS: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/web/dist");

#[derive(Clone)]
struct WebState {
    app_state: Arc<AppState>,
    auth_hub: AuthHub,
}

#[derive(Clone, Default)]
struct AuthHub {
    login_buckets: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl AuthHub {
    const MAX_BUCKET_KEYS: usize = 4096;

    fn prune_buckets(
        buckets: &mut HashMap<String, VecDeque<Instant>>,
        now: Instant,
        window: Duration,
        max_keys: usize,
    ) {
        buckets.retain(|_, bucket| {
            while let Some(ts) = bucket.front() {
                if now.duration_since(*ts) > window {
                    let _ = bucket.pop_front();
                } else {
                    break;
                }
            }
            !bucket.is_empty()
        });
        if buckets.len() <= max_keys {
            return;
        }
        let mut by_oldest = buckets
            .iter()
            .filter_map(|(k, bucket)| bucket.back().copied().map(|ts| (k.clone(), ts)))
            .collect::<Vec<_>>();
        by_oldest.sort_by_key(|(_, ts)| *ts);
        let remove_n = buckets.len().saturating_sub(max_keys);
        for (k, _) in by_oldest.into_iter().take(remove_n) {
            let _ = buckets.remove(&k);
        }
    }

    /// Sliding-window limit on login attempts per client key.
    async fn allow_login_attempt(
        &self,
        client_key: &str,
        max_attempts: usize,
        window: Duration,
    ) -> bool {
        let now = Instant::now();
        let mut guard = self.login_buckets.lock().await;
        Self::prune_buckets(&mut guard, now, window, Self::MAX_BUCKET_KEYS);
        if !guard.contains_key(client_key) && guard.len() >= Self::MAX_BUCKET_KEYS {
            return false;
        }
        let bucket = guard.entry(client_key.to_string()).or_default();
        if bucket.len() >= max_attempts {
            return false;
        }
        bucket.push_back(now);
        true
    }

    /// Forget a client's attempts after it proves its credentials.
    async fn clear_login_attempts(&self, client_key: &str) {
        let _ = self.login_buckets.lock().await.remove(client_key);
    }
}

async fn index() -> impl IntoResponse {
    match WEB_ASSETS.get_file("index.html") {
        Some(file) => Html(String::from_utf8_lossy(file.contents()).to_string()).into_response(),
        None => (StatusCode::NOT_FOUND, "index.html missing").into_response(),
    }
}

async fn asset_file(Path(file): Path<String>) -> impl IntoResponse {
    let clean = file.replace("..", "");
    match WEB_ASSETS.get_file(format!("assets/{clean}")) {
        Some(file) => {
            let content_type = if clean.ends_with(".css") {
                "text/css; charset=utf-8"
            } else if clean.ends_with(".js") {
                "application/javascript; charset=utf-8"
            } else if clean.ends_with(".svg") {
                "image/svg+xml"
            } else {
                "application/octet-stream"
            };
            ([("content-type", content_type)], file.contents().to_vec()).into_response()
        }
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}

async fn api_health(State(state): State<WebState>) -> Json<serde_json::Value> {
    let companion = &state.app_state.companion;
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
        "model_configured": companion.model_configured(),
        "document_loaded": companion.document_loaded(),
    }))
}

fn build_router(web_state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/assets/*file", get(asset_file))
        .route("/api/health", get(api_health))
        .route("/api/auth/status", get(auth::api_auth_status))
        .route("/api/auth/register", post(auth::api_auth_register))
        .route("/api/auth/login", post(auth::api_auth_login))
        .route("/api/auth/logout", post(auth::api_auth_logout))
        .route("/api/users/me", get(auth::api_users_me))
        .route(
            "/api/messages",
            get(messages::api_get_messages).post(messages::api_post_message),
        )
        .route("/api/conversations", get(messages::api_get_conversations))
        .route("/api/resources", get(resources::api_resources))
        .with_state(web_state)
}

pub async fn start_web_server(state: Arc<AppState>) {
    let web_state = WebState {
        app_state: state.clone(),
        auth_hub: AuthHub::default(),
    };
    let router = build_router(web_state);

    let addr = format!("{}:{}", state.config.web_host, state.config.web_port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind web server at {}: {}", addr, e);
            return;
        }
    };

    info!("HopeBot available at http://{addr}");
    let service = router.into_make_service_with_connect_info::<SocketAddr>();
    if let Err(e) = axum::serve(listener, service).await {
        error!("Web server error: {e}");
    }
}
