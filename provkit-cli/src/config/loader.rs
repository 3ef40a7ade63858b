use super::types::{
    DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS, ProvkitConfig, RawProvkitConfig, RawRemoteConfig,
    RemoteConfig, SessionConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Overrides `remote.base_url` from every config file
pub const API_BASE_ENV: &str = "PROVKIT_API_BASE";

/// Overrides the project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "PROVKIT_PROJECT_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<ProvkitConfig> {
        let mut raw = RawProvkitConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Layer 3: Environment
        if let Ok(base_url) = std::env::var(API_BASE_ENV)
            && !base_url.trim().is_empty()
        {
            raw.remote.base_url = Some(base_url);
        }

        Ok(Self::finalize(raw))
    }

    fn read_raw(path: &Path) -> Result<RawProvkitConfig> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "provkit").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with PROVKIT_PROJECT_CONFIG_DIR env var
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".provkit/config.toml")
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawProvkitConfig, overlay: RawProvkitConfig) -> RawProvkitConfig {
        RawProvkitConfig {
            remote: RawRemoteConfig {
                base_url: overlay.remote.base_url.or(base.remote.base_url),
                token: overlay.remote.token.or(base.remote.token),
                timeout_secs: overlay.remote.timeout_secs.or(base.remote.timeout_secs),
            },
            session: SessionConfig {
                default_tab: overlay.session.default_tab.or(base.session.default_tab),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawProvkitConfig) -> ProvkitConfig {
        ProvkitConfig {
            remote: RemoteConfig {
                base_url: raw
                    .remote
                    .base_url
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                token: raw.remote.token.filter(|token| !token.is_empty()),
                timeout_secs: raw.remote.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            },
            session: raw.session,
        }
    }

    /// Load config from a specific path (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<ProvkitConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(ProvkitConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nonexistent.toml");

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.remote.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.remote.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_from_valid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[remote]
base_url = "http://dashboard:6185"
token = "abc"

[session]
default_tab = "tts"
"#
        )
        .unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();

        assert_eq!(config.remote.base_url, "http://dashboard:6185");
        assert_eq!(config.remote.token.as_deref(), Some("abc"));
        assert_eq!(config.remote.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(config.session.default_tab.as_deref(), Some("tts"));
    }

    #[test]
    fn test_load_invalid_toml_returns_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("invalid.toml");
        std::fs::write(&path, "this is not valid toml {{").unwrap();

        let result = ConfigLoader::load_from_path(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_token_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[remote]\ntoken = \"\"\n").unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert!(config.remote.token.is_none());
    }

    #[test]
    fn test_merge_raw_overlay_overrides_base() {
        let base = RawProvkitConfig {
            remote: RawRemoteConfig {
                base_url: Some("http://base".to_string()),
                token: Some("base-token".to_string()),
                timeout_secs: Some(10),
            },
            session: SessionConfig {
                default_tab: Some("stt".to_string()),
            },
        };

        let overlay = RawProvkitConfig {
            remote: RawRemoteConfig {
                base_url: Some("http://overlay".to_string()),
                token: None,
                timeout_secs: Some(60),
            },
            session: SessionConfig::default(),
        };

        let merged = ConfigLoader::merge_raw(base, overlay);

        assert_eq!(merged.remote.base_url.as_deref(), Some("http://overlay"));
        assert_eq!(merged.remote.token.as_deref(), Some("base-token"));
        assert_eq!(merged.remote.timeout_secs, Some(60));
        assert_eq!(merged.session.default_tab.as_deref(), Some("stt"));
    }

    #[test]
    #[serial]
    fn test_project_config_dir_override() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "[remote]\nbase_url = \"http://project:6185\"\n",
        )
        .unwrap();

        // SAFETY: env access is serialized by #[serial]
        unsafe {
            std::env::set_var(PROJECT_CONFIG_DIR_ENV, temp_dir.path());
            std::env::remove_var(API_BASE_ENV);
        }

        let path = ConfigLoader::project_config_path();
        let config = ConfigLoader::load();

        unsafe {
            std::env::remove_var(PROJECT_CONFIG_DIR_ENV);
        }

        assert_eq!(path, temp_dir.path().join("config.toml"));
        assert_eq!(config.unwrap().remote.base_url, "http://project:6185");
    }

    #[test]
    #[serial]
    fn test_api_base_env_wins() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join("config.toml"),
            "[remote]\nbase_url = \"http://project:6185\"\n",
        )
        .unwrap();

        // SAFETY: env access is serialized by #[serial]
        unsafe {
            std::env::set_var(PROJECT_CONFIG_DIR_ENV, temp_dir.path());
            std::env::set_var(API_BASE_ENV, "http://env:6185");
        }

        let config = ConfigLoader::load();

        unsafe {
            std::env::remove_var(PROJECT_CONFIG_DIR_ENV);
            std::env::remove_var(API_BASE_ENV);
        }

        assert_eq!(config.unwrap().remote.base_url, "http://env:6185");
    }

    #[test]
    #[serial]
    fn test_project_config_path_default() {
        // SAFETY: env access is serialized by #[serial]
        unsafe {
            std::env::remove_var(PROJECT_CONFIG_DIR_ENV);
        }
        let path = ConfigLoader::project_config_path();
        assert_eq!(path, PathBuf::from(".provkit/config.toml"));
    }

    #[test]
    fn test_user_config_path_mentions_provkit() {
        if let Some(path) = ConfigLoader::user_config_path() {
            assert!(path.to_string_lossy().contains("provkit"));
            assert!(path.ends_with("config.toml"));
        }
    }
}
