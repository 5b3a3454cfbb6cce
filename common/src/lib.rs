/*!
common/src/lib.rs

Shared configuration types for newsrelay.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- Startup validation of the values the bot and server depend on
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default Telegram Bot API base URL
pub const DEFAULT_BOT_API_URL: &str = "https://api.telegram.org";

/// Web app URL used when neither config nor `WEBAPP_URL` provide one
pub const DEFAULT_WEBAPP_URL: &str = "https://example.com";

/// HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind (e.g. "0.0.0.0")
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Directory holding the built front-end bundle, served under `/static`
    pub static_dir: Option<String>,
}

/// Telegram bot section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Name of the environment variable holding the bot token
    pub token_env: Option<String>,
    pub webapp_url: Option<String>,
    pub api_url: Option<String>,
    pub poll_timeout_seconds: Option<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token_env: None,
            webapp_url: None,
            api_url: None,
            poll_timeout_seconds: None,
        }
    }
}

impl BotConfig {
    pub fn token_env(&self) -> &str {
        self.token_env.as_deref().unwrap_or("BOT_TOKEN")
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_BOT_API_URL)
    }

    pub fn poll_timeout_seconds(&self) -> u64 {
        self.poll_timeout_seconds.unwrap_or(30)
    }

    /// Web app URL: `WEBAPP_URL` env var, then config, then the built-in default.
    pub fn resolve_webapp_url(&self) -> String {
        std::env::var("WEBAPP_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.webapp_url.clone())
            .unwrap_or_else(|| DEFAULT_WEBAPP_URL.to_string())
    }
}

fn default_true() -> bool {
    true
}

/// Overrides for the item the store starts with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsConfig {
    pub title: Option<String>,
    pub text: Option<String>,
    pub image_url: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub news: NewsConfig,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(
        default_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (path, label) in [(default_path, "default"), (override_path, "override")] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value
            .try_into()
            .context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Check values that would otherwise only fail once the bot is talking to users.
    pub fn validate(&self) -> Result<()> {
        let webapp_url = self.bot.resolve_webapp_url();
        let parsed = url::Url::parse(&webapp_url)
            .with_context(|| format!("Invalid web app URL: {}", webapp_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("Web app URL must be http(s): {}", webapp_url);
        }

        url::Url::parse(self.bot.api_url())
            .with_context(|| format!("Invalid bot API URL: {}", self.bot.api_url()))?;
        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn config_from_string() {
        let toml = r#"
            [server]
            bind = "127.0.0.1"
            port = 8080

            [bot]
            token_env = "NEWS_BOT_TOKEN"
            webapp_url = "https://news.example.org"

            [news]
            title = "Hello"
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.server.port, Some(8080));
        assert!(cfg.bot.enabled);
        assert_eq!(cfg.bot.token_env(), "NEWS_BOT_TOKEN");
        assert_eq!(cfg.bot.api_url(), DEFAULT_BOT_API_URL);
        assert_eq!(cfg.bot.poll_timeout_seconds(), 30);
        assert_eq!(cfg.news.title.as_deref(), Some("Hello"));
        assert!(cfg.news.text.is_none());
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg: Config = toml::from_str("").expect("parse empty config");
        assert!(cfg.bot.enabled);
        assert_eq!(cfg.bot.token_env(), "BOT_TOKEN");
        assert!(cfg.server.static_dir.is_none());
    }

    #[tokio::test]
    async fn override_file_takes_precedence() {
        let dir = tempfile::tempdir().expect("tempdir");

        let default_path = dir.path().join("config.default.toml");
        let mut f = std::fs::File::create(&default_path).expect("create default");
        writeln!(f, "[server]\nport = 8000\nbind = \"0.0.0.0\"\n[bot]\npoll_timeout_seconds = 10")
            .expect("write default");

        let override_path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&override_path).expect("create override");
        writeln!(f, "[server]\nport = 9000\n[bot]\nenabled = false").expect("write override");

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load config");

        assert_eq!(cfg.server.port, Some(9000));
        assert_eq!(cfg.server.bind.as_deref(), Some("0.0.0.0"));
        assert!(!cfg.bot.enabled);
        assert_eq!(cfg.bot.poll_timeout_seconds(), 10);
    }

    #[tokio::test]
    async fn missing_files_are_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");

        let cfg = Config::load_with_defaults(Some(&missing), None)
            .await
            .expect("load config");
        assert!(cfg.server.port.is_none());
    }

    #[tokio::test]
    async fn from_file_reports_bad_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").expect("write");

        let err = Config::from_file(&path).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse TOML"));
    }

    #[test]
    fn validate_rejects_non_http_webapp_url() {
        let cfg = Config {
            bot: BotConfig {
                webapp_url: Some("ftp://example.com".to_string()),
                ..BotConfig::default()
            },
            ..Config::default()
        };
        // WEBAPP_URL from the environment would win over the config value
        if std::env::var("WEBAPP_URL").is_err() {
            assert!(cfg.validate().is_err());
        }
    }
}
