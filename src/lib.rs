pub mod companion;
pub mod config;
pub mod fallback;
pub mod knowledge;
pub mod llm;
pub mod runtime;
pub mod web;

pub use hopebot_app::logging;
pub use hopebot_core::error;
pub use hopebot_core::llm_types;
pub use hopebot_core::resource;
pub use hopebot_core::text;
pub use hopebot_storage::db;
