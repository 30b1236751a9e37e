use thiserror::Error;

#[derive(Error, Debug)]
pub enum HopeBotError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Failure kinds reported by a language-model provider.
///
/// Callers never show these to end users; the reply pipeline downgrades both
/// kinds to a fallback passage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM quota exceeded")]
    QuotaExceeded,

    #[error("LLM API error: {0}")]
    Api(String),
}

impl LlmError {
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::QuotaExceeded => "quota_exceeded",
            LlmError::Api(_) => "api_error",
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Api(e.to_string())
    }
}
