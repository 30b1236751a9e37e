//! Loads a background document from `knowledge_document_path` through the
//! normal state wiring. Kept in its own test binary because the document is
//! loaded once per process.

use std::sync::Arc;

use hopebot::config::Config;
use hopebot::db::Database;
use hopebot::runtime::AppState;

const DOCUMENT: &str = "\
Mental wellbeing in adolescence is shaped by family routines and school climate over many years.

Regular exercise and consistent sleep were associated with better mood in the cohort studies.
";

#[tokio::test]
async fn configured_document_feeds_fallback_replies() {
    let dir = std::env::temp_dir().join(format!("hopebot_doc_{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let doc_path = dir.join("background.txt");
    std::fs::write(&doc_path, DOCUMENT).unwrap();

    let yaml = format!(
        "data_dir: '{}'\nknowledge_document_path: '{}'\n",
        dir.join("data").display(),
        doc_path.display()
    );
    let config = Config::from_yaml(&yaml).unwrap();
    assert!(!config.model_configured());

    let db = Arc::new(Database::new(&config.data_root_dir().to_string_lossy()).unwrap());
    let state = AppState::new(config, db);
    assert!(state.companion.document_loaded());

    let reply = state.companion.reply("does exercise help my mood").await;
    assert!(reply.starts_with("Based on the academic literature by Leighton and Dogra"));
    assert!(reply.contains("Regular exercise and consistent sleep"));
    assert!(!reply.contains("adolescence"));

    let _ = std::fs::remove_dir_all(&dir);
}
