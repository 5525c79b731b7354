//! Configuration handling for the client

use anyhow::{anyhow, Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use uuid::Uuid;

/// Default number of history entries shown for a lookup
pub const DEFAULT_HISTORY_LIMIT: usize = 5;

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api/forms";

/// User configuration for the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the form service
    pub api_base_url: String,
    /// Form opened on startup
    pub form_id: Option<String>,
    /// Maximum history entries per lookup
    pub history_limit: usize,
    /// Session cookie sent with every request
    pub session_cookie: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            form_id: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            session_cookie: None,
        }
    }
}

impl ClientConfig {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("io", "clinform", "clinform").map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Load configuration from file only
    fn load_file() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => {
                let content = fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&content)
                    .with_context(|| format!("Invalid config file {}", path.display()))
            }
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Store the form id in the config file so the next start opens it.
    /// Environment overrides are not written back.
    pub fn remember_form_id(form_id: Uuid) -> Result<()> {
        let mut stored = Self::load_file()?;
        let form_id = form_id.to_string();
        if stored.form_id.as_deref() == Some(form_id.as_str()) {
            return Ok(());
        }
        stored.form_id = Some(form_id);
        stored.save()
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let content = serde_json::to_string_pretty(self)?;
            fs::write(&path, content)?;
        }
        Ok(())
    }

    /// Override fields from `CLINFORM_*` variables
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let set = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        if let Some(base) = set("CLINFORM_API_BASE") {
            self.api_base_url = base;
        }
        if let Some(form_id) = set("CLINFORM_FORM_ID") {
            self.form_id = Some(form_id);
        }
        if let Some(cookie) = set("CLINFORM_SESSION_COOKIE") {
            self.session_cookie = Some(cookie);
        }
    }

    /// Form to open: the command-line argument wins over configuration
    pub fn resolve_form_id(&self, arg: Option<&str>) -> Result<Uuid> {
        let raw = arg
            .or(self.form_id.as_deref())
            .ok_or_else(|| anyhow!("No form id given; pass one as an argument or set CLINFORM_FORM_ID"))?;
        Uuid::parse_str(raw.trim()).with_context(|| format!("'{raw}' is not a valid form id"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE);
        assert_eq!(config.history_limit, 5);
        assert!(config.form_id.is_none());
        assert!(config.session_cookie.is_none());
    }

    #[test]
    fn test_serialization() {
        let config = ClientConfig {
            api_base_url: "https://forms.example.com/api".to_string(),
            form_id: Some("dc8e18b4-b0ad-4b76-a4c5-cd340f84d494".to_string()),
            history_limit: 10,
            session_cookie: Some("sid=1".to_string()),
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: ClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_deserialize_from_empty_json() {
        let parsed: ClientConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, ClientConfig::default());
    }

    #[test]
    fn test_deserialize_with_extra_fields() {
        let json = r#"{"history_limit": 3, "unknown_field": "value"}"#;
        let parsed: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.history_limit, 3);
        assert_eq!(parsed.api_base_url, DEFAULT_API_BASE);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ClientConfig::default();
        config.apply_env(env(&[
            ("CLINFORM_API_BASE", "https://other.example.com"),
            ("CLINFORM_SESSION_COOKIE", "sid=2"),
            ("CLINFORM_FORM_ID", "  "),
        ]));
        assert_eq!(config.api_base_url, "https://other.example.com");
        assert_eq!(config.session_cookie.as_deref(), Some("sid=2"));
        assert!(config.form_id.is_none());
    }

    #[test]
    fn test_resolve_form_id() {
        let config = ClientConfig {
            form_id: Some("dc8e18b4-b0ad-4b76-a4c5-cd340f84d494".to_string()),
            ..Default::default()
        };
        assert!(config.resolve_form_id(None).is_ok());
        assert!(config.resolve_form_id(Some("nope")).is_err());
        assert!(ClientConfig::default().resolve_form_id(None).is_err());
    }

    #[test]
    fn test_config_path_returns_option() {
        let _path = ClientConfig::config_path();
    }
}
