use crate::error::HopeBotError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_llm_provider() -> String {
    "openai".into()
}
fn default_max_tokens() -> u32 {
    500
}
fn default_temperature() -> f32 {
    0.7
}
fn default_llm_timeout_secs() -> u64 {
    60
}
fn default_data_dir() -> String {
    "./hopebot.data".into()
}
fn default_timezone() -> String {
    "UTC".into()
}
fn default_web_host() -> String {
    "127.0.0.1".into()
}
fn default_web_port() -> u16 {
    5000
}
fn default_session_ttl_hours() -> i64 {
    24
}
fn default_login_max_attempts() -> usize {
    5
}
fn default_login_window_seconds() -> u64 {
    60
}
fn default_log_retention_days() -> i64 {
    hopebot_app::logging::DEFAULT_LOG_RETENTION_DAYS
}

pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

const SUPPORTED_PROVIDERS: [&str; 3] = ["openai", "anthropic", "ollama"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_llm_provider")]
    pub llm_provider: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub llm_base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub environment: Environment,
    #[serde(default = "default_web_host")]
    pub web_host: String,
    #[serde(default = "default_web_port")]
    pub web_port: u16,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: i64,
    #[serde(default = "default_login_max_attempts")]
    pub login_max_attempts: usize,
    #[serde(default = "default_login_window_seconds")]
    pub login_window_seconds: u64,
    /// Key the login throttle on `X-Forwarded-For` instead of the peer address.
    /// Only enable behind a reverse proxy that sets the header.
    #[serde(default)]
    pub trust_x_forwarded_for: bool,
    /// Plain-text reference document for the model prompt and keyword fallback.
    #[serde(default)]
    pub knowledge_document_path: Option<String>,
    #[serde(default)]
    pub triage_enabled: bool,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            llm_provider: default_llm_provider(),
            api_key: String::new(),
            model: String::new(),
            llm_base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            llm_timeout_secs: default_llm_timeout_secs(),
            data_dir: default_data_dir(),
            timezone: default_timezone(),
            environment: Environment::default(),
            web_host: default_web_host(),
            web_port: default_web_port(),
            session_ttl_hours: default_session_ttl_hours(),
            login_max_attempts: default_login_max_attempts(),
            login_window_seconds: default_login_window_seconds(),
            trust_x_forwarded_for: false,
            knowledge_document_path: None,
            triage_enabled: false,
            log_retention_days: default_log_retention_days(),
        }
    }
}

impl Config {
    pub fn data_root_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_root_dir().join("logs")
    }

    pub fn secure_cookies(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Whether a hosted model can be called at all.
    pub fn model_configured(&self) -> bool {
        self.llm_provider == "ollama" || !self.api_key.trim().is_empty()
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }

    pub fn resolve_config_path() -> Result<Option<PathBuf>, HopeBotError> {
        if let Ok(custom) = std::env::var("HOPEBOT_CONFIG") {
            if std::path::Path::new(&custom).exists() {
                return Ok(Some(PathBuf::from(custom)));
            }
            return Err(HopeBotError::Config(format!(
                "HOPEBOT_CONFIG points to non-existent file: {custom}"
            )));
        }

        if std::path::Path::new("./hopebot.config.yaml").exists() {
            return Ok(Some(PathBuf::from("./hopebot.config.yaml")));
        }
        if std::path::Path::new("./hopebot.config.yml").exists() {
            return Ok(Some(PathBuf::from("./hopebot.config.yml")));
        }
        Ok(None)
    }

    /// Load config from YAML, falling back to defaults when no file exists.
    pub fn load() -> Result<Self, HopeBotError> {
        match Self::resolve_config_path()? {
            Some(path) => Self::from_file(&path),
            None => {
                let mut config = Config::default();
                config.post_deserialize()?;
                Ok(config)
            }
        }
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, HopeBotError> {
        let path_str = path.to_string_lossy().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| HopeBotError::Config(format!("Failed to read {path_str}: {e}")))?;
        Self::from_yaml(&content)
            .map_err(|e| HopeBotError::Config(format!("Failed to load {path_str}: {e}")))
    }

    pub fn from_yaml(content: &str) -> Result<Self, HopeBotError> {
        let mut config: Config = serde_yaml::from_str(content)
            .map_err(|e| HopeBotError::Config(format!("invalid YAML: {e}")))?;
        config.post_deserialize()?;
        Ok(config)
    }

    /// Apply post-deserialization normalization and validation.
    pub fn post_deserialize(&mut self) -> Result<(), HopeBotError> {
        self.llm_provider = self.llm_provider.trim().to_lowercase();
        if self.llm_provider.is_empty() {
            self.llm_provider = default_llm_provider();
        }
        if !SUPPORTED_PROVIDERS.contains(&self.llm_provider.as_str()) {
            return Err(HopeBotError::Config(format!(
                "Unsupported llm_provider '{}' (expected one of: {})",
                self.llm_provider,
                SUPPORTED_PROVIDERS.join(", ")
            )));
        }

        self.api_key = self.api_key.trim().to_string();
        if self.model.trim().is_empty() {
            self.model = match self.llm_provider.as_str() {
                "anthropic" => "claude-sonnet-4-5-20250929".into(),
                "ollama" => "llama3.2".into(),
                _ => "gpt-4o".into(),
            };
        }

        if let Some(ref url) = self.llm_base_url {
            if url.trim().is_empty() {
                self.llm_base_url = None;
            }
        }
        if let Some(ref path) = self.knowledge_document_path {
            if path.trim().is_empty() {
                self.knowledge_document_path = None;
            }
        }

        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| HopeBotError::Config(format!("Invalid timezone: {}", self.timezone)))?;

        if !(self.temperature.is_finite() && (0.0..=2.0).contains(&self.temperature)) {
            return Err(HopeBotError::Config(
                "temperature must be between 0 and 2".into(),
            ));
        }

        if self.data_dir.trim().is_empty() {
            self.data_dir = default_data_dir();
        }
        if self.web_host.trim().is_empty() {
            self.web_host = default_web_host();
        }
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
        if self.llm_timeout_secs == 0 {
            self.llm_timeout_secs = default_llm_timeout_secs();
        }
        if self.session_ttl_hours <= 0 {
            self.session_ttl_hours = default_session_ttl_hours();
        }
        if self.session_ttl_hours > MAX_SESSION_TTL_HOURS {
            return Err(HopeBotError::Config(format!(
                "session_ttl_hours must be at most {MAX_SESSION_TTL_HOURS}"
            )));
        }
        if self.login_max_attempts == 0 {
            self.login_max_attempts = default_login_max_attempts();
        }
        if self.login_window_seconds == 0 {
            self.login_window_seconds = default_login_window_seconds();
        }
        if self.log_retention_days <= 0 {
            self.log_retention_days = default_log_retention_days();
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn test_defaults() -> Self {
        let mut cfg = Config::default();
        cfg.post_deserialize().expect("defaults must validate");
        cfg
    }
}
