use parley_agent::ModelConfig;
use parley_core::{ParleyError, ParleyResult};
use parley_gateway::StreamOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Where sessions are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    File,
    Memory,
}

impl FromStr for SessionBackend {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(ParleyError::Config(format!("Unknown session backend: {other}"))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    /// Tool server configuration file.
    #[serde(default = "default_mcp_config")]
    pub mcp_config: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// `local` logs human-readable lines; anything else logs JSON.
    #[serde(default = "default_environment")]
    pub environment: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionsConfig {
    #[serde(default)]
    pub backend: SessionBackend,
    #[serde(default = "default_session_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub done_sentinel: Option<String>,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::default(),
            dir: default_session_dir(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            done_sentinel: None,
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            server: ServerConfig::default(),
            sessions: SessionsConfig::default(),
            stream: StreamConfig::default(),
            mcp_config: default_mcp_config(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_environment() -> String {
    "local".to_string()
}
fn default_session_dir() -> PathBuf {
    PathBuf::from("./.sessions")
}
fn default_keep_alive_secs() -> u64 {
    15
}
fn default_mcp_config() -> PathBuf {
    PathBuf::from("mcp_config.json")
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> ParleyResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ParleyError::Config(format!("Invalid value for {name}: {value}")))
}

impl AppConfig {
    /// Read the TOML file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> ParleyResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(data) => Self::from_toml(&data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ParleyError::Config(format!(
                "Failed to read config file '{}': {e}",
                path.display()
            ))),
        }
    }

    pub fn from_toml(data: &str) -> ParleyResult<Self> {
        toml::from_str(data).map_err(|e| ParleyError::Config(e.to_string()))
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> ParleyResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MODEL_ID") {
            self.model.model_id = v;
        }
        if let Some(v) = lookup("MODEL_PROVIDER") {
            self.model.provider = v.parse()?;
        }
        if let Some(v) = lookup("MODEL_API_KEY") {
            self.model.api_key = Some(v);
        }
        if let Some(v) = lookup("MODEL_BASE_URL") {
            self.model.api_base_url = Some(v);
        }
        if let Some(v) = lookup("MODEL_TEMPERATURE") {
            self.model.temperature = parse_var("MODEL_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("MODEL_MAX_TOKENS") {
            self.model.max_tokens = parse_var("MODEL_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("ENVIRONMENT") {
            self.server.environment = v;
        }
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("PORT") {
            self.server.port = parse_var("PORT", &v)?;
        }
        if let Some(v) = lookup("SESSION_DIR") {
            self.sessions.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("SESSION_BACKEND") {
            self.sessions.backend = v.parse()?;
        }
        if let Some(v) = lookup("MCP_CONFIG") {
            self.mcp_config = PathBuf::from(v);
        }
        if let Some(v) = lookup("STREAM_DONE_SENTINEL") {
            self.stream.done_sentinel = Some(v).filter(|s| !s.is_empty());
        }
        Ok(())
    }

    pub fn validate(&self) -> ParleyResult<()> {
        self.model.validate()
    }

    pub fn is_local(&self) -> bool {
        self.server.environment == "local"
    }

    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions {
            done_sentinel: self.stream.done_sentinel.clone(),
            keep_alive_secs: self.stream.keep_alive_secs,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use parley_agent::LlmProvider;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
        assert!(config.is_local());
        assert_eq!(config.sessions.backend, SessionBackend::File);
        assert_eq!(config.mcp_config, PathBuf::from("mcp_config.json"));
        assert!(config.stream_options().done_sentinel.is_none());
    }

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml(
            r#"
            mcp_config = "tools.json"

            [model]
            provider = "groq"
            model_id = "llama-3.1-8b-instant"

            [server]
            port = 9000
            environment = "production"

            [sessions]
            backend = "memory"

            [stream]
            done_sentinel = "[DONE]"
            "#,
        )
        .unwrap();

        assert_eq!(config.model.provider, LlmProvider::Groq);
        assert_eq!(config.server.port, 9000);
        assert!(!config.is_local());
        assert_eq!(config.sessions.backend, SessionBackend::Memory);
        assert_eq!(config.stream_options().done_sentinel.as_deref(), Some("[DONE]"));
        assert_eq!(config.stream_options().keep_alive_secs, 15);
        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("MODEL_ID", "gpt-4o-mini"),
                ("MODEL_PROVIDER", "openrouter"),
                ("MODEL_TEMPERATURE", "0.9"),
                ("PORT", "8080"),
                ("SESSION_BACKEND", "memory"),
                ("SESSION_DIR", "/tmp/parley"),
                ("STREAM_DONE_SENTINEL", "[DONE]"),
            ]))
            .unwrap();

        assert_eq!(config.model.model_id, "gpt-4o-mini");
        assert_eq!(config.model.provider, LlmProvider::OpenRouter);
        assert!((config.model.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.sessions.backend, SessionBackend::Memory);
        assert_eq!(config.sessions.dir, PathBuf::from("/tmp/parley"));
        assert_eq!(config.stream.done_sentinel.as_deref(), Some("[DONE]"));
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut config = AppConfig::default();
        let err = config.apply_env(env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));

        let err = config
            .apply_env(env(&[("SESSION_BACKEND", "redis")]))
            .unwrap_err();
        assert!(matches!(err, ParleyError::Config(_)));
    }

    #[test]
    fn test_missing_model_id_fails_validation() {
        assert!(AppConfig::default().validate().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&tmp.path().join("parley.toml")).unwrap();
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_load_malformed_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("parley.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }
}
