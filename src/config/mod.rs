//! Configuration management.
//!
//! Configuration loads from defaults, optional config files, and
//! environment variables, in that order. Secrets (JWT secret, provider
//! API keys, Redis URL) are additionally read from their conventional
//! bare environment variables so deployment tooling does not have to
//! know the prefixed form.

use serde::{Deserialize, Serialize};

use crate::entitlement::PlanTable;
use crate::llm::Provider;
use crate::tools::ToolSettings;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Gateway configuration (auth, rate limiting).
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Redis configuration.
    #[serde(default)]
    pub redis: RedisConfig,
    /// Default LLM settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Tool service connections.
    #[serde(default)]
    pub tools: ToolSettings,
    /// Per-plan daily quota limits.
    #[serde(default)]
    pub plans: PlanTable,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment and config files.
    ///
    /// Sources, in order: defaults, `config/harbor-api.{toml,yaml,...}`
    /// if present, then `HARBOR__`-prefixed environment variables.
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("llm.model", "gpt-4o")?
            .set_default("llm.max_tokens", 4096)?
            .set_default("llm.temperature", 0.7)?
            .add_source(config::File::with_name("config/harbor-api").required(false))
            .add_source(
                config::Environment::with_prefix("HARBOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        // A malformed file or environment override is a startup error,
        // not a silent fall-back to defaults
        let mut app_config: AppConfig = config.try_deserialize()?;

        // Conventional bare environment variables win for secrets
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            app_config.gateway.jwt_secret = Some(secret);
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            app_config.redis.url = Some(url);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            app_config.llm.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            app_config.llm.api_key = Some(key);
            app_config.llm.provider = Provider::Groq;
        }
        if let Ok(key) = std::env::var("SEARCH_API_KEY") {
            app_config.tools.search_api_key = Some(key);
        }

        Ok(app_config)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Main API port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    300
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServerConfig {
    /// The socket address string to bind to.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// JWT secret for session token validation. Without it every request
    /// resolves to a guest.
    pub jwt_secret: Option<String>,
    /// Rate limit requests per minute per identity.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    /// Rate limit burst size.
    #[serde(default = "default_rate_burst")]
    pub rate_limit_burst: u32,
    /// Messages any one identity may submit per UTC day.
    #[serde(default = "default_daily_message_cap")]
    pub daily_message_cap: u32,
    /// Whether resumable streams are registered at all.
    #[serde(default = "default_true")]
    pub resumable_streams: bool,
    /// System prompt prepended to every turn.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_rate_limit() -> u32 {
    60
}

fn default_rate_burst() -> u32 {
    10
}

fn default_daily_message_cap() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

fn default_system_prompt() -> String {
    "You are a helpful assistant. Use the available tools when they improve your answer.".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            rate_limit_per_minute: default_rate_limit(),
            rate_limit_burst: default_rate_burst(),
            daily_message_cap: default_daily_message_cap(),
            resumable_streams: true,
            system_prompt: default_system_prompt(),
        }
    }
}

/// Redis configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL. Absent means the in-memory usage store.
    pub url: Option<String>,
}

/// Default LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider type.
    #[serde(default)]
    pub provider: Provider,
    /// Base URL override.
    pub base_url: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Default model to use.
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens to generate.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for sampling.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            base_url: None,
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl LlmConfig {
    /// Resolve into driver settings, filling the provider default base
    /// URL when none is configured.
    pub fn to_settings(&self) -> crate::llm::LlmSettings {
        crate::llm::LlmSettings {
            base_url: self
                .base_url
                .clone()
                .unwrap_or_else(|| self.provider.default_base_url().to_string()),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            provider: self.provider,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Whether to emit JSON-formatted logs.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "gpt-4o");
        assert!(config.gateway.jwt_secret.is_none());
        assert!(config.gateway.resumable_streams);
        assert_eq!(config.plans.free.searches_per_day, 10);
    }

    #[test]
    fn logging_config_carries_level_and_format() {
        let logging: LoggingConfig =
            serde_json::from_value(serde_json::json!({ "level": "debug", "json": true })).unwrap();
        assert_eq!(logging.level, "debug");
        assert!(logging.json);

        let defaults = LoggingConfig::default();
        assert_eq!(defaults.level, "info");
        assert!(!defaults.json);
    }

    #[test]
    fn malformed_environment_override_fails_loud() {
        // Env mutation is process-global; this is the only test that
        // touches this variable.
        unsafe { std::env::set_var("HARBOR__SERVER__PORT", "not-a-port") };
        let result = AppConfig::load();
        unsafe { std::env::remove_var("HARBOR__SERVER__PORT") };

        assert!(result.is_err());
    }

    #[test]
    fn llm_config_resolves_provider_base_url() {
        let config = LlmConfig {
            provider: Provider::Groq,
            ..LlmConfig::default()
        };
        let settings = config.to_settings();
        assert_eq!(settings.base_url, "https://api.groq.com");

        let config = LlmConfig {
            base_url: Some("http://localhost:9999".to_string()),
            ..LlmConfig::default()
        };
        assert_eq!(config.to_settings().base_url, "http://localhost:9999");
    }
}
