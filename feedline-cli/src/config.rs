//! CLI configuration file.
//!
//! ```toml
//! api_url = "http://localhost:8000/api/"
//! token_refresh_url = "http://localhost:8000/api/token/refresh/"
//! session_file = "/home/ana/.local/share/feedline/session.json"
//! timeout_secs = 30
//! ```
//!
//! Every field is optional. Environment variables win over the file, and
//! command line flags win over both.

use std::fs;
use std::path::{Path, PathBuf};

use feedline_client::ClientConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CliError, Result};

const APP_DIR: &str = "feedline";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_refresh_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl AppConfig {
    /// `<config dir>/feedline/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// `<data dir>/feedline/session.json`
    pub fn default_session_file() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(APP_DIR).join("session.json"))
    }

    fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
        path.map(Path::to_path_buf)
            .or_else(Self::default_path)
            .ok_or_else(|| {
                CliError::InvalidInput(
                    "cannot determine the configuration directory; pass --config".into(),
                )
            })
    }

    /// Load the configuration. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!(path = %path.display(), "Loaded configuration");
                Ok(toml::from_str(&content)?)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let path = Self::resolve_path(path)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Overwrite the configuration file with the defaults.
    pub fn reset(path: Option<&Path>) -> Result<()> {
        Self::default().save(path)
    }

    pub fn show(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Session file: flag, then configuration, then the data directory.
    pub fn session_file(&self, flag: Option<&Path>) -> Result<PathBuf> {
        flag.map(Path::to_path_buf)
            .or_else(|| self.session_file.clone())
            .or_else(Self::default_session_file)
            .ok_or_else(|| {
                CliError::InvalidInput(
                    "cannot determine the data directory; pass --session-file".into(),
                )
            })
    }

    /// Build the client configuration from the process environment.
    pub fn client_config(&self, api_url: Option<&str>) -> Result<ClientConfig> {
        self.client_config_with(api_url, |key| std::env::var(key).ok())
    }

    /// Layer `api_url` over `env` over this file.
    pub fn client_config_with<F>(&self, api_url: Option<&str>, env: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = ClientConfig::from_lookup(|key| match key {
            "FEEDLINE_API_URL" => api_url
                .map(str::to_owned)
                .or_else(|| env(key))
                .or_else(|| self.api_url.clone()),
            "FEEDLINE_TOKEN_REFRESH_URL" => env(key).or_else(|| self.token_refresh_url.clone()),
            "FEEDLINE_TIMEOUT_SECS" => {
                env(key).or_else(|| self.timeout_secs.map(|s| s.to_string()))
            }
            _ => env(key),
        })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_save_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = AppConfig {
            api_url: Some("http://feed.example/api/".into()),
            timeout_secs: Some(5),
            ..Default::default()
        };

        config.save(Some(&path)).unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap(), config);

        AppConfig::reset(Some(&path)).unwrap();
        assert_eq!(AppConfig::load(Some(&path)).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "api_url = [").unwrap();
        assert!(matches!(
            AppConfig::load(Some(&path)),
            Err(CliError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_layering() {
        let file = AppConfig {
            api_url: Some("http://file.example/api/".into()),
            timeout_secs: Some(7),
            ..Default::default()
        };

        let config = file.client_config_with(None, |_| None).unwrap();
        assert_eq!(config.api_url.as_str(), "http://file.example/api/");
        assert_eq!(config.timeout, Duration::from_secs(7));

        let env = |key: &str| (key == "FEEDLINE_API_URL").then(|| "http://env.example/api".to_string());
        let config = file.client_config_with(None, env).unwrap();
        assert_eq!(config.api_url.as_str(), "http://env.example/api/");

        let config = file
            .client_config_with(Some("http://flag.example/api/"), env)
            .unwrap();
        assert_eq!(config.api_url.as_str(), "http://flag.example/api/");
        assert_eq!(
            config.token_refresh_url.as_str(),
            "http://flag.example/api/token/refresh/"
        );
    }

    #[test]
    fn test_session_file_precedence() {
        let config = AppConfig {
            session_file: Some(PathBuf::from("/tmp/from-config.json")),
            ..Default::default()
        };
        assert_eq!(
            config.session_file(Some(Path::new("/tmp/flag.json"))).unwrap(),
            PathBuf::from("/tmp/flag.json")
        );
        assert_eq!(
            config.session_file(None).unwrap(),
            PathBuf::from("/tmp/from-config.json")
        );
    }
}
