//! Client configuration.
//!
//! Precedence: defaults < config file < environment < command-line flags.
//! The file is YAML; every field is optional and blank values keep the
//! default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const ENV_BASE_URL: &str = "APPLIN_BASE_URL";
pub const ENV_LOG_LEVEL: &str = "APPLIN_LOG_LEVEL";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["console", "json"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to resolve HOME")]
    Home,
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub server: ServerConfig,
    pub pages: PagesConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub base_url: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagesConfig {
    pub home: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateConfig {
    /// `None` disables persistence.
    pub path: Option<PathBuf>,
    pub save_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                base_url: "http://127.0.0.1:8000".to_string(),
                connect_timeout_ms: 5_000,
                request_timeout_ms: 30_000,
            },
            pages: PagesConfig {
                home: "/".to_string(),
            },
            state: StateConfig {
                path: None,
                save_interval_secs: 5,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "console".to_string(),
            },
        }
    }
}

impl Config {
    /// Defaults with the state file under `~/.local/share/applin` when HOME
    /// is known.
    pub fn default_from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(home) = std::env::var("HOME") {
            if !home.trim().is_empty() {
                cfg.state.path = Some(
                    PathBuf::from(home)
                        .join(".local")
                        .join("share")
                        .join("applin")
                        .join("state.json"),
                );
            }
        }
        cfg
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.server.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.state.save_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.server.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::Invalid("server.base_url is empty".into()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "server.base_url must be http or https, got {base_url:?}"
            )));
        }
        if !self.pages.home.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "pages.home must start with '/', got {:?}",
                self.pages.home
            )));
        }
        if self.server.connect_timeout_ms == 0 || self.server.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("server timeouts must be positive".into()));
        }
        if self.state.save_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "state.save_interval_secs must be positive".into(),
            ));
        }
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {LOG_LEVELS:?}, got {:?}",
                self.logging.level
            )));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be one of {LOG_FORMATS:?}, got {:?}",
                self.logging.format
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    #[serde(default)]
    server: PartialServerConfig,
    #[serde(default)]
    pages: PartialPagesConfig,
    #[serde(default)]
    state: PartialStateConfig,
    #[serde(default)]
    logging: PartialLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
struct PartialServerConfig {
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    connect_timeout_ms: u64,
    #[serde(default)]
    request_timeout_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialPagesConfig {
    #[serde(default)]
    home: String,
}

#[derive(Debug, Default, Deserialize)]
struct PartialStateConfig {
    #[serde(default)]
    path: String,
    #[serde(default)]
    save_interval_secs: u64,
}

#[derive(Debug, Default, Deserialize)]
struct PartialLoggingConfig {
    #[serde(default)]
    level: String,
    #[serde(default)]
    format: String,
}

/// Load defaults and the config file. An explicit path must be readable; the
/// default path is skipped when missing. Returns the file actually used.
pub fn load_config(config_file: Option<&str>) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let mut cfg = Config::default_from_env();

    let explicit = config_file
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from);
    let required = explicit.is_some();
    let Some(path) = explicit.or_else(default_config_path) else {
        return Ok((cfg, None));
    };

    match std::fs::read_to_string(&path) {
        Ok(text) => {
            apply_yaml(&mut cfg, &text)?;
            Ok((cfg, Some(path)))
        }
        Err(source) if required => Err(ConfigError::Read { path, source }),
        Err(_) => Ok((cfg, None)),
    }
}

/// Merge a YAML document over `cfg`.
pub fn apply_yaml(cfg: &mut Config, text: &str) -> Result<(), ConfigError> {
    // An empty document parses as null.
    let parsed: Option<PartialConfig> = serde_yaml::from_str(text)?;
    apply_partial(cfg, parsed.unwrap_or_default())
}

/// Apply `APPLIN_*` overrides read through `lookup`.
pub fn apply_env(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
        cfg.server.base_url = url.trim().to_string();
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.trim().is_empty()) {
        cfg.logging.level = level.trim().to_ascii_lowercase();
    }
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.trim().is_empty() {
            return Some(PathBuf::from(xdg).join("applin").join("config.yaml"));
        }
    }
    if let Ok(home) = std::env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(
                PathBuf::from(home)
                    .join(".config")
                    .join("applin")
                    .join("config.yaml"),
            );
        }
    }
    None
}

fn apply_partial(cfg: &mut Config, partial: PartialConfig) -> Result<(), ConfigError> {
    if !partial.server.base_url.trim().is_empty() {
        cfg.server.base_url = partial.server.base_url.trim().to_string();
    }
    if partial.server.connect_timeout_ms > 0 {
        cfg.server.connect_timeout_ms = partial.server.connect_timeout_ms;
    }
    if partial.server.request_timeout_ms > 0 {
        cfg.server.request_timeout_ms = partial.server.request_timeout_ms;
    }
    if !partial.pages.home.trim().is_empty() {
        cfg.pages.home = partial.pages.home.trim().to_string();
    }
    if !partial.state.path.trim().is_empty() {
        cfg.state.path = Some(expand_tilde(partial.state.path.trim())?);
    }
    if partial.state.save_interval_secs > 0 {
        cfg.state.save_interval_secs = partial.state.save_interval_secs;
    }
    if !partial.logging.level.trim().is_empty() {
        cfg.logging.level = partial.logging.level.trim().to_ascii_lowercase();
    }
    if !partial.logging.format.trim().is_empty() {
        cfg.logging.format = partial.logging.format.trim().to_ascii_lowercase();
    }
    Ok(())
}

pub fn expand_tilde(input: &str) -> Result<PathBuf, ConfigError> {
    if input == "~" {
        let home = std::env::var("HOME").map_err(|_| ConfigError::Home)?;
        return Ok(PathBuf::from(home));
    }
    if let Some(rest) = input.strip_prefix("~/") {
        let home = std::env::var("HOME").map_err(|_| ConfigError::Home)?;
        return Ok(PathBuf::from(home).join(rest));
    }
    Ok(Path::new(input).to_path_buf())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn yaml_overrides_only_given_fields() {
        let mut cfg = Config::default();
        apply_yaml(
            &mut cfg,
            "server:\n  base_url: https://app.example\npages:\n  home: /inbox\nlogging:\n  format: JSON\n",
        )
        .unwrap();
        assert_eq!(cfg.server.base_url, "https://app.example");
        assert_eq!(cfg.server.request_timeout_ms, 30_000);
        assert_eq!(cfg.pages.home, "/inbox");
        assert_eq!(cfg.logging.format, "json");
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn empty_yaml_keeps_defaults() {
        let mut cfg = Config::default();
        apply_yaml(&mut cfg, "").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn bad_yaml_is_a_parse_error() {
        let mut cfg = Config::default();
        let err = apply_yaml(&mut cfg, "server: [1, 2").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg = Config::default();
        let env: HashMap<&str, &str> = [
            (ENV_BASE_URL, "http://10.0.0.2:9000"),
            (ENV_LOG_LEVEL, "DEBUG"),
        ]
        .into_iter()
        .collect();
        apply_env(&mut cfg, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.server.base_url, "http://10.0.0.2:9000");
        assert_eq!(cfg.logging.level, "debug");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_config(Some("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "state:\n  save_interval_secs: 30\n").unwrap();

        let (cfg, used) = load_config(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(used.as_deref(), Some(path.as_path()));
        assert_eq!(cfg.state.save_interval_secs, 30);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.server.base_url = "ftp://x".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.pages.home = "inbox".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.logging.format = "xml".into();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.server.request_timeout_ms = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn absolute_paths_are_not_expanded() {
        assert_eq!(expand_tilde("/var/x").unwrap(), PathBuf::from("/var/x"));
    }
}
