use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::currency::CurrencyPair;

pub const DEFAULT_PROVIDER_URL: &str = "https://free.currconv.com";
pub const DEFAULT_SINK_PORT: u16 = 15000;
const MAX_DECIMALS: usize = 8;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ScheduleConfig {
    pub steady_secs: u64,
    pub retry_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            steady_secs: 60,
            retry_secs: 30,
        }
    }
}

impl ScheduleConfig {
    pub fn steady_interval(&self) -> Duration {
        Duration::from_secs(self.steady_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.retry_secs == 0 {
            bail!("Retry interval must be greater than zero");
        }
        if self.retry_secs > self.steady_secs {
            bail!(
                "Retry interval ({}s) must not exceed steady interval ({}s)",
                self.retry_secs,
                self.steady_secs
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Report a rate of zero instead of an error when the response lacks the
    /// requested pair. Matches the behaviour older consumers relied on.
    pub zero_on_missing_pair: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: DEFAULT_PROVIDER_URL.to_string(),
            api_key: None,
            timeout_secs: 10,
            zero_on_missing_pair: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Print labels to stdout, one per line
    #[default]
    Stdout,
    /// POST labels to a local HTTP endpoint
    Http,
    /// Send updates to the shepherd daemon
    Shepherd,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SinkConfig {
    pub kind: SinkKind,
    pub port: u16,
    pub icon: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        SinkConfig {
            kind: SinkKind::default(),
            port: DEFAULT_SINK_PORT,
            icon: None,
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub from: Option<String>,
    pub to: Option<String>,
    #[serde(default = "default_decimals")]
    pub decimals: usize,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    pub log_file: Option<PathBuf>,
}

fn default_decimals() -> usize {
    2
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            from: None,
            to: None,
            decimals: default_decimals(),
            schedule: ScheduleConfig::default(),
            provider: ProviderConfig::default(),
            sink: SinkConfig::default(),
            log_file: None,
        }
    }
}

/// Validated, immutable settings for one indicator process.
#[derive(Debug, Clone)]
pub struct Settings {
    pub pair: CurrencyPair,
    pub decimals: usize,
    pub schedule: ScheduleConfig,
    pub provider: ProviderConfig,
    pub sink: SinkConfig,
}

impl AppConfig {
    /// Loads the user config file if one exists, otherwise the defaults.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "currency-indicator")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn has_pair(&self) -> bool {
        self.from.as_deref().is_some_and(|c| !c.trim().is_empty())
            && self.to.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    pub fn into_settings(self) -> Result<Settings> {
        let pair = CurrencyPair::new(
            self.from.as_deref().unwrap_or_default(),
            self.to.as_deref().unwrap_or_default(),
        )?;
        if self.decimals > MAX_DECIMALS {
            bail!(
                "Decimals must be at most {}, got {}",
                MAX_DECIMALS,
                self.decimals
            );
        }
        self.schedule.validate()?;

        Ok(Settings {
            pair,
            decimals: self.decimals,
            schedule: self.schedule,
            provider: self.provider,
            sink: self.sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
from: "EUR"
to: "USD"
decimals: 3
schedule:
  steady_secs: 1800
  retry_secs: 30
provider:
  base_url: "http://example.com/rates"
  api_key: "secret"
sink:
  kind: shepherd
  port: 16000
  icon: "/usr/share/icons/currency.png"
log_file: "/tmp/indicator.log"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.from.as_deref(), Some("EUR"));
        assert_eq!(config.to.as_deref(), Some("USD"));
        assert_eq!(config.decimals, 3);
        assert_eq!(config.schedule.steady_interval(), Duration::from_secs(1800));
        assert_eq!(config.schedule.retry_interval(), Duration::from_secs(30));
        assert_eq!(config.provider.base_url, "http://example.com/rates");
        assert_eq!(config.provider.api_key.as_deref(), Some("secret"));
        assert_eq!(config.provider.timeout_secs, 10);
        assert!(!config.provider.zero_on_missing_pair);
        assert_eq!(config.sink.kind, SinkKind::Shepherd);
        assert_eq!(config.sink.port, 16000);
        assert_eq!(
            config.sink.icon.as_deref(),
            Some("/usr/share/icons/currency.png")
        );
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/indicator.log")));

        let settings = config.into_settings().unwrap();
        assert_eq!(settings.pair.id(), "EUR_USD");
    }

    #[test]
    fn test_config_defaults() {
        let config: AppConfig = serde_yaml::from_str("from: GBP").unwrap();
        assert_eq!(config.decimals, 2);
        assert_eq!(config.schedule.steady_secs, 60);
        assert_eq!(config.schedule.retry_secs, 30);
        assert_eq!(config.provider.base_url, DEFAULT_PROVIDER_URL);
        assert_eq!(config.sink.kind, SinkKind::Stdout);
        assert_eq!(config.sink.port, DEFAULT_SINK_PORT);
        assert!(!config.has_pair());
    }

    #[test]
    fn test_missing_pair_is_rejected() {
        let config = AppConfig {
            from: Some("EUR".to_string()),
            ..AppConfig::default()
        };
        let err = config.into_settings().unwrap_err();
        assert_eq!(err.to_string(), "Missing to currency");
    }

    #[test]
    fn test_invalid_schedule_is_rejected() {
        let mut config = AppConfig {
            from: Some("EUR".to_string()),
            to: Some("USD".to_string()),
            ..AppConfig::default()
        };
        config.schedule.retry_secs = 120;
        let err = config.clone().into_settings().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Retry interval (120s) must not exceed steady interval (60s)"
        );

        config.schedule.retry_secs = 0;
        assert!(config.clone().into_settings().is_err());

        config.schedule.retry_secs = 30;
        config.decimals = 9;
        assert!(config.into_settings().is_err());
    }
}
