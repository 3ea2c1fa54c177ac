use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Portal configuration. Every field has a default so the portal runs
/// without a config file at all; a file that exists but does not parse
/// is a startup error.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    pub port: u16,
    pub changelog_path: PathBuf,
    pub poll_interval_secs: u64,
    pub error_backoff_secs: u64,
    pub list_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            port: 5500,
            changelog_path: PathBuf::from("changelog.json"),
            poll_interval_secs: 30,
            error_backoff_secs: 60,
            list_timeout_secs: 10,
            command_timeout_secs: 30,
        }
    }
}

impl PortalConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(toml::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config file at {path:?}, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.list_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: PortalConfig = toml::from_str("").expect("Failed to parse empty config");
        assert_eq!(config.port, 5500);
        assert_eq!(config.changelog_path, PathBuf::from("changelog.json"));
        assert_eq!(config.poll_interval(), Duration::from_secs(30));
        assert_eq!(config.error_backoff(), Duration::from_secs(60));
    }

    #[test]
    fn test_partial_override() {
        let input = r#"
            port = 8080
            changelog_path = "/var/lib/blueport/changelog.json"
        "#;
        let config: PortalConfig = toml::from_str(input).expect("Failed to parse config");
        assert_eq!(config.port, 8080);
        assert_eq!(
            config.changelog_path,
            PathBuf::from("/var/lib/blueport/changelog.json")
        );
        // Untouched fields keep their defaults
        assert_eq!(config.command_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let config = PortalConfig::load(Path::new("/nonexistent/blueport.toml"))
            .expect("Missing file should fall back to defaults");
        assert_eq!(config.port, 5500);
    }
}
