use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::companion::Companion;
use crate::config::Config;
use crate::db::{call_blocking, now_timestamp, Database};
use crate::knowledge::load_background_document;
use crate::resource::DEFAULT_RESOURCES;

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

pub struct AppState {
    pub config: Config,
    pub db: Arc<Database>,
    pub companion: Companion,
}

impl AppState {
    /// Wire the companion from config. The database is opened by the caller.
    pub fn new(config: Config, db: Arc<Database>) -> Self {
        let document =
            load_background_document(config.knowledge_document_path.as_deref().map(Path::new));
        let llm = crate::llm::create_provider(&config);
        if llm.is_none() {
            warn!(
                provider = %config.llm_provider,
                "No API key configured, replies will use built-in passages"
            );
        }
        let companion = Companion::new(llm, document, config.max_tokens, config.temperature);
        AppState {
            config,
            db,
            companion,
        }
    }
}

pub async fn run(config: Config, db: Database) -> anyhow::Result<()> {
    let db = Arc::new(db);

    let seeded = call_blocking(db.clone(), |db| {
        db.seed_resources_if_empty(&DEFAULT_RESOURCES)
    })
    .await?;
    if seeded > 0 {
        info!("Seeded {seeded} default resources");
    }

    let state = Arc::new(AppState::new(config, db));
    info!(
        model_configured = state.companion.model_configured(),
        document_loaded = state.companion.document_loaded(),
        "Companion initialized"
    );

    spawn_session_purger(state.db.clone());
    crate::web::start_web_server(state).await;
    Ok(())
}

fn spawn_session_purger(db: Arc<Database>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let now = now_timestamp();
            match call_blocking(db.clone(), move |db| db.purge_stale_sessions(&now)).await {
                Ok(0) => {}
                Ok(n) => info!("Purged {n} stale auth sessions"),
                Err(e) => warn!("Session purge failed: {e}"),
            }
        }
    });
}
