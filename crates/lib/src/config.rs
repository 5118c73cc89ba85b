//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.linegem/config.json`) and environment.
//! Environment variables win over file values; credentials are validated once at startup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Webhook server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (LINE).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Generation service settings (Gemini).
    #[serde(default)]
    pub gemini: GeminiConfig,
}

impl Config {
    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gemini.timeout_secs == 0 {
            anyhow::bail!("gemini.timeoutSecs must be greater than 0");
        }
        Ok(())
    }
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 3000). Overridden by PORT env.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0"; LINE must be able to reach the webhook).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    3000
}

fn default_gateway_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub line: LineChannelConfig,
}

/// LINE Messaging API channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChannelConfig {
    /// Long-lived channel access token. Overridden by CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Channel secret used to verify X-Line-Signature. Overridden by CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// API base URL (default https://api.line.me). Useful for tests and proxies.
    pub api_base: Option<String>,
}

/// Gemini generateContent settings. Sampling parameters are fixed in code and not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    /// API key. Overridden by GEMINI_API_KEY env.
    pub api_key: Option<String>,
    /// Model id (default "gemini-1.5-flash").
    #[serde(default = "default_gemini_model")]
    pub model: String,
    /// API base URL (default https://generativelanguage.googleapis.com).
    pub base_url: Option<String>,
    /// Request timeout in seconds (default 60).
    #[serde(default = "default_gemini_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_timeout_secs() -> u64 {
    60
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            base_url: None,
            timeout_secs: default_gemini_timeout_secs(),
        }
    }
}

pub const ENV_CONFIG_PATH: &str = "LINEGEM_CONFIG_PATH";
pub const ENV_CHANNEL_ACCESS_TOKEN: &str = "CHANNEL_ACCESS_TOKEN";
pub const ENV_CHANNEL_SECRET: &str = "CHANNEL_SECRET";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_PORT: &str = "PORT";

/// Secrets the server cannot run without. Built once at startup from a loaded [`Config`].
#[derive(Clone)]
pub struct Credentials {
    pub channel_access_token: String,
    pub channel_secret: String,
    pub gemini_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("channel_access_token", &"<redacted>")
            .field("channel_secret", &"<redacted>")
            .field("gemini_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Collect credentials from config (after env overrides). Fails listing every missing setting.
    pub fn from_config(config: &Config) -> Result<Self> {
        let access_token = non_empty(config.channels.line.channel_access_token.as_deref());
        let secret = non_empty(config.channels.line.channel_secret.as_deref());
        let api_key = non_empty(config.gemini.api_key.as_deref());

        let mut missing = Vec::new();
        if access_token.is_none() {
            missing.push(ENV_CHANNEL_ACCESS_TOKEN);
        }
        if secret.is_none() {
            missing.push(ENV_CHANNEL_SECRET);
        }
        if api_key.is_none() {
            missing.push(ENV_GEMINI_API_KEY);
        }
        match (access_token, secret, api_key) {
            (Some(channel_access_token), Some(channel_secret), Some(gemini_api_key)) => Ok(Self {
                channel_access_token,
                channel_secret,
                gemini_api_key,
            }),
            _ => anyhow::bail!(
                "missing required configuration: {} (set the environment variables or the config file)",
                missing.join(", ")
            ),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH).map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".linegem").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Apply environment overrides. `lookup` returns the raw value of a variable; blank values are ignored.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let env = |name: &str| lookup(name).and_then(|v| non_empty(Some(v.as_str())));

    if let Some(token) = env(ENV_CHANNEL_ACCESS_TOKEN) {
        config.channels.line.channel_access_token = Some(token);
    }
    if let Some(secret) = env(ENV_CHANNEL_SECRET) {
        config.channels.line.channel_secret = Some(secret);
    }
    if let Some(key) = env(ENV_GEMINI_API_KEY) {
        config.gemini.api_key = Some(key);
    }
    if let Some(port) = env(ENV_PORT) {
        config.gateway.port = port
            .parse()
            .with_context(|| format!("parsing {}={:?} as a port", ENV_PORT, port))?;
    }
    Ok(())
}

/// Load config from the given path (or LINEGEM_CONFIG_PATH / default). Missing file => default config.
/// Environment overrides are applied. Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config
        .validate()
        .with_context(|| format!("invalid config in {}", path.display()))?;
    Ok((config, path))
}
