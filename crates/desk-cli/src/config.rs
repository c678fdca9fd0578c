//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use desk_api::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

/// Configuration for desk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the support backend
    pub api_url: Option<String>,
    /// Agent selected when `--agent` is not given
    pub default_agent: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("desk")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("DESK_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load config from the default location
    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load config from `path`, falling back to defaults when it is missing
    /// or unreadable
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, content)
    }

    /// Create a default config file at the default location if there is none
    pub fn init() -> std::io::Result<PathBuf> {
        let path = Self::config_path();
        Self::init_at(&path)?;
        Ok(path)
    }

    /// Create a default config file at `path` unless one already exists
    pub fn init_at(path: &Path) -> std::io::Result<()> {
        if path.exists() {
            return Ok(());
        }
        let default_config = Config {
            api_url: Some(DEFAULT_BASE_URL.to_string()),
            default_agent: None,
            request_timeout_secs: Some(DEFAULT_TIMEOUT.as_secs()),
        };
        default_config.save_to(path)
    }

    /// Request timeout, if configured. Zero is treated as unset.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Pick the backend URL: flag, then environment, then config file, then the
/// built-in default. Blank values are skipped.
pub fn pick_api_url(
    flag: Option<String>,
    env: Option<String>,
    file: Option<String>,
) -> String {
    [flag, env, file]
        .into_iter()
        .flatten()
        .find(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# desk configuration file
# Place at ~/.config/desk/config.toml (Linux/Mac) or %APPDATA%\desk\config.toml (Windows)
# or point DESK_CONFIG_PATH at another file.

# Support backend to talk to (DESK_API_URL and --api-url take precedence)
api_url = "http://localhost:8000"

# Agent to chat with when --agent is not given
# (defaults to the first agent the backend lists)
# default_agent = "agent-1"

# Per-request timeout in seconds
request_timeout_secs = 30
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "default_agent = \"agent-7\"\n").unwrap();

        let config = Config::load_from(&path);
        assert_eq!(config.default_agent.as_deref(), Some("agent-7"));
        assert!(config.api_url.is_none());
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = [not toml").unwrap();

        assert_eq!(Config::load_from(&path), Config::default());
    }

    #[test]
    fn test_init_writes_loadable_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Config::init_at(&path).unwrap();
        let config = Config::load_from(&path);
        assert_eq!(config.api_url.as_deref(), Some(DEFAULT_BASE_URL));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));

        // An existing file is left alone
        fs::write(&path, "default_agent = \"kept\"\n").unwrap();
        Config::init_at(&path).unwrap();
        assert_eq!(
            Config::load_from(&path).default_agent.as_deref(),
            Some("kept")
        );
    }

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.api_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.request_timeout_secs, Some(30));
    }

    #[test]
    fn test_zero_timeout_is_unset() {
        let config = Config {
            request_timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_api_url_precedence() {
        let s = |v: &str| Some(v.to_string());
        assert_eq!(
            pick_api_url(s("http://flag"), s("http://env"), s("http://file")),
            "http://flag"
        );
        assert_eq!(pick_api_url(None, s("http://env"), s("http://file")), "http://env");
        assert_eq!(pick_api_url(None, s("  "), s("http://file")), "http://file");
        assert_eq!(pick_api_url(None, None, None), DEFAULT_BASE_URL);
    }
}
