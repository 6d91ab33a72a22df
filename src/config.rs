use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MailError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub labels: LabelConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Number of most-recent messages mirrored on refresh
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
    /// Retries for a single metadata fetch on transient errors
    #[serde(default = "default_metadata_retries")]
    pub metadata_retries: u32,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            fetch_concurrency: default_fetch_concurrency(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            metadata_retries: default_metadata_retries(),
        }
    }
}

impl MailboxConfig {
    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelConfig {
    #[serde(default = "default_label_list_visibility")]
    pub label_list_visibility: String,
    #[serde(default = "default_message_list_visibility")]
    pub message_list_visibility: String,
    /// Strip a deleted label from cached messages instead of waiting for the next refresh
    #[serde(default = "default_cascade_delete")]
    pub cascade_delete: bool,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            label_list_visibility: default_label_list_visibility(),
            message_list_visibility: default_message_list_visibility(),
            cascade_delete: default_cascade_delete(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_max_results() -> u32 {
    20
}

fn default_fetch_concurrency() -> usize {
    10
}

fn default_refresh_timeout_secs() -> u64 {
    30
}

fn default_metadata_retries() -> u32 {
    2
}

fn default_label_list_visibility() -> String {
    "labelShow".to_string()
}

fn default_message_list_visibility() -> String {
    "show".to_string()
}

fn default_cascade_delete() -> bool {
    true
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

const LABEL_LIST_VISIBILITIES: &[&str] = &["labelShow", "labelShowIfUnread", "labelHide"];
const MESSAGE_LIST_VISIBILITIES: &[&str] = &["show", "hide"];

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| MailError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;
        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| MailError::ConfigError(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.mailbox.max_results == 0 {
            return Err(MailError::ConfigError(
                "mailbox.max_results must be at least 1".to_string(),
            ));
        }
        if self.mailbox.max_results > 500 {
            return Err(MailError::ConfigError(
                "mailbox.max_results cannot exceed 500 (Gmail list page limit)".to_string(),
            ));
        }

        if self.mailbox.fetch_concurrency == 0 {
            return Err(MailError::ConfigError(
                "mailbox.fetch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.mailbox.fetch_concurrency > 50 {
            return Err(MailError::ConfigError(
                "mailbox.fetch_concurrency cannot exceed 50".to_string(),
            ));
        }

        if self.mailbox.refresh_timeout_secs == 0 {
            return Err(MailError::ConfigError(
                "mailbox.refresh_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.mailbox.metadata_retries > 5 {
            return Err(MailError::ConfigError(
                "mailbox.metadata_retries cannot exceed 5".to_string(),
            ));
        }

        if !LABEL_LIST_VISIBILITIES.contains(&self.labels.label_list_visibility.as_str()) {
            return Err(MailError::ConfigError(format!(
                "Invalid labels.label_list_visibility: '{}'. Must be one of {:?}",
                self.labels.label_list_visibility, LABEL_LIST_VISIBILITIES
            )));
        }
        if !MESSAGE_LIST_VISIBILITIES.contains(&self.labels.message_list_visibility.as_str()) {
            return Err(MailError::ConfigError(format!(
                "Invalid labels.message_list_visibility: '{}'. Must be one of {:?}",
                self.labels.message_list_visibility, MESSAGE_LIST_VISIBILITIES
            )));
        }

        if self.api.user_id.trim().is_empty() {
            return Err(MailError::ConfigError(
                "api.user_id cannot be empty".to_string(),
            ));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(MailError::ConfigError(
                "api.request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.mailbox.max_results, 20);
        assert_eq!(config.mailbox.fetch_concurrency, 10);
        assert_eq!(config.mailbox.refresh_timeout(), Duration::from_secs(30));
        assert_eq!(config.mailbox.metadata_retries, 2);

        assert_eq!(config.labels.label_list_visibility, "labelShow");
        assert_eq!(config.labels.message_list_visibility, "show");
        assert!(config.labels.cascade_delete);

        assert_eq!(config.api.user_id, "me");
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_max_results_bounds() {
        let mut config = Config::default();
        config.mailbox.max_results = 0;
        assert!(config.validate().unwrap_err().to_string().contains("at least 1"));

        config.mailbox.max_results = 501;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 500"));

        config.mailbox.max_results = 1;
        assert!(config.validate().is_ok());
        config.mailbox.max_results = 500;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_fetch_concurrency_bounds() {
        let mut config = Config::default();
        config.mailbox.fetch_concurrency = 0;
        assert!(config.validate().is_err());

        config.mailbox.fetch_concurrency = 51;
        assert!(config.validate().unwrap_err().to_string().contains("cannot exceed 50"));

        config.mailbox.fetch_concurrency = 50;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_timeouts() {
        let mut config = Config::default();
        config.mailbox.refresh_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.api.request_timeout_secs = 0;
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("request_timeout_secs"));
    }

    #[test]
    fn test_config_validation_visibility() {
        let mut config = Config::default();
        config.labels.label_list_visibility = "visible".to_string();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("Invalid labels.label_list_visibility"));

        let mut config = Config::default();
        config.labels.message_list_visibility = "labelHide".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.labels.label_list_visibility = "labelShowIfUnread".to_string();
        config.labels.message_list_visibility = "hide".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_user_id() {
        let mut config = Config::default();
        config.api.user_id = "  ".to_string();
        assert!(config.validate().unwrap_err().to_string().contains("user_id"));
    }

    #[test]
    fn test_config_partial_with_defaults() {
        let config = Config::from_toml(
            r#"
[mailbox]
max_results = 50

[labels]
cascade_delete = false
"#,
        )
        .unwrap();

        assert_eq!(config.mailbox.max_results, 50);
        assert!(!config.labels.cascade_delete);
        assert_eq!(config.mailbox.fetch_concurrency, 10);
        assert_eq!(config.api.user_id, "me");
    }

    #[test]
    fn test_config_from_toml_rejects_invalid_values() {
        let result = Config::from_toml("[mailbox]\nmax_results = 0\n");
        assert!(matches!(result, Err(MailError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_config_load_nonexistent_returns_default() {
        let path = Path::new("/tmp/nonexistent-mail-mirror-config-12345.toml");
        let config = Config::load(path).await.unwrap();
        assert_eq!(config.mailbox.max_results, 20);
    }

    #[tokio::test]
    async fn test_config_load_invalid_toml() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), "this is not valid toml {[}]")
            .await
            .unwrap();

        let result = Config::load(temp_file.path()).await;
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Failed to parse config file"));
    }

    #[tokio::test]
    async fn test_config_load_from_file() {
        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(
            temp_file.path(),
            "[api]\nuser_id = \"someone@example.com\"\nrequest_timeout_secs = 5\n",
        )
        .await
        .unwrap();

        let config = Config::load(temp_file.path()).await.unwrap();
        assert_eq!(config.api.user_id, "someone@example.com");
        assert_eq!(config.api.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized = Config::from_toml(&serialized).unwrap();

        assert_eq!(config.mailbox.max_results, deserialized.mailbox.max_results);
        assert_eq!(
            config.labels.label_list_visibility,
            deserialized.labels.label_list_visibility
        );
        assert_eq!(config.api.user_id, deserialized.api.user_id);
    }
}
