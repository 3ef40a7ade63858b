use serde::{Deserialize, Serialize};

/// Default dashboard address
pub const DEFAULT_BASE_URL: &str = "http://localhost:6185";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawProvkitConfig {
    #[serde(default)]
    pub remote: RawRemoteConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Remote config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawRemoteConfig {
    /// Base URL of the dashboard API
    pub base_url: Option<String>,

    /// Bearer token sent with every request
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvkitConfig {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the dashboard API
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Provider type tab to start on (e.g. "chat_completion", "tts")
    pub default_tab: Option<String>,
}

impl ProvkitConfig {
    /// Copy with the token masked, for display.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.remote.token.is_some() {
            config.remote.token = Some("********".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = ProvkitConfig::default();
        assert_eq!(config.remote.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.remote.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.remote.token.is_none());
        assert!(config.session.default_tab.is_none());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ProvkitConfig {
            remote: RemoteConfig {
                base_url: "http://10.0.0.2:6185".to_string(),
                token: Some("secret".to_string()),
                timeout_secs: 5,
            },
            session: SessionConfig {
                default_tab: Some("text_to_speech".to_string()),
            },
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: ProvkitConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.remote.base_url, "http://10.0.0.2:6185");
        assert_eq!(parsed.remote.token.as_deref(), Some("secret"));
        assert_eq!(parsed.remote.timeout_secs, 5);
        assert_eq!(parsed.session.default_tab.as_deref(), Some("text_to_speech"));
    }

    #[test]
    fn test_raw_config_partial_parsing() {
        let toml_str = r#"
[remote]
timeout_secs = 10
"#;
        let raw: RawProvkitConfig = toml::from_str(toml_str).unwrap();

        assert_eq!(raw.remote.timeout_secs, Some(10));
        assert!(raw.remote.base_url.is_none());
        assert!(raw.session.default_tab.is_none());
    }

    #[test]
    fn test_redacted_hides_token() {
        let mut config = ProvkitConfig::default();
        config.remote.token = Some("secret".to_string());

        let shown = toml::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("secret"));
        assert!(shown.contains("********"));
    }
}
