use crate::core::schedule::{PollSchedule, FIRST_CHECK, RAPID_INTERVAL, SECOND_CHECK, TIMEOUT};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api: ApiSettings,
    pub polling: PollingSettings,
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            token: None,
            request_timeout_secs: 10,
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub first_check_ms: u64,
    pub second_check_ms: u64,
    pub rapid_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            first_check_ms: FIRST_CHECK.as_millis() as u64,
            second_check_ms: SECOND_CHECK.as_millis() as u64,
            rapid_interval_ms: RAPID_INTERVAL.as_millis() as u64,
            timeout_ms: TIMEOUT.as_millis() as u64,
        }
    }
}

impl PollingSettings {
    pub fn schedule(&self) -> Result<PollSchedule> {
        PollSchedule::new(
            Duration::from_millis(self.first_check_ms),
            Duration::from_millis(self.second_check_ms),
            Duration::from_millis(self.rapid_interval_ms),
            Duration::from_millis(self.timeout_ms),
        )
        .context("Invalid [polling] schedule")
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("recipe-poller").join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path().context("Could not determine config directory")?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        if self.api.request_timeout_secs == 0 {
            anyhow::bail!("api.request_timeout_secs must be greater than 0");
        }
        self.polling.schedule()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.api.base_url, "http://localhost:8080/api");
        assert!(settings.api.token.is_none());
        assert_eq!(settings.api.request_timeout(), Duration::from_secs(10));
        assert!(!settings.debug);
        assert_eq!(
            settings.polling.schedule().unwrap(),
            PollSchedule::default()
        );
    }

    #[test]
    fn test_settings_validation() {
        let mut settings = Settings::default();
        assert!(settings.validate().is_ok());

        settings.api.base_url = "  ".to_string();
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.api.request_timeout_secs = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.polling.timeout_ms = 9_000;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            debug = true

            [api]
            base_url = "https://meals.example.com/api"
            token = "secret"

            [polling]
            first_check_ms = 3000
            second_check_ms = 6000
            rapid_interval_ms = 500
            timeout_ms = 15000
        "#;

        let settings: Settings = toml::from_str(toml).unwrap();
        assert!(settings.debug);
        assert_eq!(settings.api.base_url, "https://meals.example.com/api");
        assert_eq!(settings.api.token.as_deref(), Some("secret"));
        assert_eq!(settings.api.request_timeout_secs, 10);

        let schedule = settings.polling.schedule().unwrap();
        assert_eq!(schedule.delay_after(0), Duration::from_secs(3));
        assert_eq!(schedule.delay_after(1), Duration::from_secs(3));
        assert_eq!(schedule.delay_after(2), Duration::from_millis(500));
        assert_eq!(schedule.timeout(), Duration::from_secs(15));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let path = std::env::temp_dir().join("recipe-poller-missing-config.toml");
        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.api.base_url, ApiSettings::default().base_url);
    }
}
