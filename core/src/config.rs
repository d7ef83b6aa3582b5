//! Centralized configuration and constants.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::platform::PromptConfig;

/// Configuration directory under the XDG config home.
const CONFIG_DIR_NAME: &str = "medremind";

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.json";

/// Credential file name.
const CREDENTIAL_FILE_NAME: &str = "pin.json";

/// Application information constants.
pub mod app_info {
    pub const NAME: &str = "MedRemind";
    pub const ID: &str = "io.github.medremind.MedRemind";
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

/// User-tunable unlock settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Text shown while the fingerprint reader is waiting.
    pub prompt_message: String,
    /// Label of the button that abandons the fingerprint prompt.
    pub cancel_label: String,
    /// Offer "Use PIN" while the fingerprint prompt is up.
    pub allow_device_fallback: bool,
    /// Upper bound for one fingerprint verification.
    pub verify_timeout_secs: u64,
    /// Overrides the default credential location.
    pub credential_path: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            prompt_message: "Use biometric or PIN".to_string(),
            cancel_label: "Cancel".to_string(),
            allow_device_fallback: true,
            verify_timeout_secs: 30,
            credential_path: None,
        }
    }
}

impl AuthConfig {
    /// Get the configuration directory path.
    pub fn config_dir() -> Option<PathBuf> {
        // Try XDG_CONFIG_HOME first, then fall back to ~/.config
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            if !xdg_config.is_empty() {
                return Some(PathBuf::from(xdg_config).join(CONFIG_DIR_NAME));
            }
        }

        dirs::config_dir().map(|p| p.join(CONFIG_DIR_NAME))
    }

    /// Get the full config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from disk.
    ///
    /// Returns the defaults if the file is missing or can't be parsed.
    pub fn load() -> Self {
        let path = match Self::config_file_path() {
            Some(p) => p,
            None => {
                warn!("No configuration directory available, using defaults");
                return Self::default();
            }
        };

        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                warn!("Failed to parse config file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse configuration from JSON text.
    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Where the PIN credential lives.
    pub fn credential_path(&self) -> Option<PathBuf> {
        self.credential_path
            .clone()
            .or_else(|| Self::config_dir().map(|d| d.join(CREDENTIAL_FILE_NAME)))
    }

    /// Prompt settings passed to the biometric platform.
    pub fn prompt(&self) -> PromptConfig {
        PromptConfig {
            prompt_message: self.prompt_message.clone(),
            cancel_label: self.cancel_label.clone(),
            allow_device_fallback: self.allow_device_fallback,
        }
    }

    /// Upper bound for one fingerprint verification.
    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config = AuthConfig::parse(r#"{ "cancel_label": "Not now" }"#).unwrap();
        assert_eq!(config.cancel_label, "Not now");
        assert_eq!(config.prompt_message, "Use biometric or PIN");
        assert!(config.allow_device_fallback);
        assert_eq!(config.verify_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn explicit_credential_path_wins() {
        let config = AuthConfig {
            credential_path: Some(PathBuf::from("/tmp/medremind-pin.json")),
            ..AuthConfig::default()
        };
        assert_eq!(
            config.credential_path(),
            Some(PathBuf::from("/tmp/medremind-pin.json"))
        );
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let config = AuthConfig {
            verify_timeout_secs: 0,
            ..AuthConfig::default()
        };
        assert_eq!(config.verify_timeout(), Duration::from_secs(1));
    }

    #[test]
    fn prompt_carries_labels() {
        let prompt = AuthConfig::default().prompt();
        assert_eq!(prompt.cancel_label, "Cancel");
        assert!(prompt.allow_device_fallback);
    }
}
