//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILSENSE_CONFIG` (environment variable)
//! 2. `~/.config/mailsense/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailsense\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! The loaded [`Config`] is passed explicitly into every component that
//! needs it; nothing reads configuration from global state.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Fetch behavior.
    pub fetch: FetchConfig,
    /// Gmail API access.
    pub gmail: GmailConfig,
    /// Text-generation (AI enrichment) settings.
    pub ai: AiConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override the state directory holding `emails.json`,
    /// `email_id_mapping.json` and `cache_metadata.json`.
    pub state_dir: Option<PathBuf>,
    /// `strftime` format string for dates in list output.
    pub date_format: String,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Fetch behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Default maximum number of messages per fetch cycle.
    pub max_results: u32,
    /// Base Gmail query; the incremental `after:` clause is appended to it.
    pub query: String,
}

/// Gmail API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// OAuth2 client ID from Google Cloud Console.
    pub client_id: String,
    /// Name of the environment variable holding the OAuth2 client secret.
    /// The secret itself is never stored in config or state files.
    pub client_secret_env: String,
    /// Override the OAuth token file path.
    pub token_path: Option<PathBuf>,
}

/// Text-generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Chat-completions endpoint URL.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    /// Maximum number of emails per enrichment prompt.
    pub batch_size: usize,
    /// Body characters included per email in a prompt.
    pub max_body_chars: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            date_format: "%Y-%m-%d %H:%M".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_results: 25,
            query: "in:inbox".to_string(),
        }
    }
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret_env: "MAILSENSE_GOOGLE_CLIENT_SECRET".to_string(),
            token_path: None,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            api_key_env: "MAILSENSE_AI_API_KEY".to_string(),
            batch_size: 10,
            max_body_chars: 2000,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<()> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILSENSE_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mailsense").join("config.toml"))
}

/// Return the state directory holding the email cache, identity mapping
/// and watermark files.
pub fn state_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.state_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailsense")
}

/// Return the OAuth token file path.
pub fn token_path(config: &Config) -> PathBuf {
    if let Some(ref path) = config.gmail.token_path {
        return path.clone();
    }
    state_dir(config).join("tokens.json")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    state_dir(config).join("mailsense.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.fetch.max_results, 25);
        assert_eq!(cfg.fetch.query, "in:inbox");
        assert_eq!(cfg.ai.batch_size, 10);
        assert_eq!(cfg.gmail.client_secret_env, "MAILSENSE_GOOGLE_CLIENT_SECRET");
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.fetch.max_results, cfg.fetch.max_results);
        assert_eq!(parsed.ai.model, cfg.ai.model);
        assert_eq!(parsed.general.date_format, cfg.general.date_format);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[fetch]
max_results = 5

[ai]
model = "local-model"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.fetch.max_results, 5);
        assert_eq!(cfg.ai.model, "local-model");
        // Other fields use defaults
        assert_eq!(cfg.fetch.query, "in:inbox");
        assert_eq!(cfg.ai.batch_size, 10);
        assert_eq!(cfg.general.log_level, "warn");
    }

    #[test]
    fn test_state_dir_override() {
        let mut cfg = Config::default();
        cfg.general.state_dir = Some(PathBuf::from("/tmp/ms-test"));
        assert_eq!(state_dir(&cfg), PathBuf::from("/tmp/ms-test"));
        assert_eq!(token_path(&cfg), PathBuf::from("/tmp/ms-test/tokens.json"));
    }
}
