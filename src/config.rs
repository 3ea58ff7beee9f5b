//! Service configuration
//!
//! Every setting can be given as a flag or through a `CARDANO_INDEX_*`
//! environment variable (a `.env` file is loaded first by the binary).

use crate::error::{AppError, Result};
use crate::scheduler::{CollectorConfig, DEFAULT_QUERIER_NAME};
use chrono_tz::Tz;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "cardano-index")]
#[command(about = "Cardano token index valuation and history service")]
pub struct Settings {
    /// Address the HTTP API binds to
    #[arg(long, env = "CARDANO_INDEX_HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "CARDANO_INDEX_PORT", default_value_t = 8000)]
    pub port: u16,

    /// Accepted bearer keys, comma separated
    #[arg(
        long,
        env = "CARDANO_INDEX_API_KEYS",
        value_delimiter = ',',
        default_value = "demo-api-key-please-change"
    )]
    pub api_keys: Vec<String>,

    #[arg(
        long,
        env = "CARDANO_INDEX_MUESLISWAP_BASE_URL",
        default_value = "https://api-v2.muesliswap.com"
    )]
    pub muesliswap_base_url: String,

    #[arg(long, env = "CARDANO_INDEX_MUESLISWAP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub muesliswap_timeout_seconds: u64,

    #[arg(long, env = "CARDANO_INDEX_CONFIG_PATH", default_value = "config/indexes.json")]
    pub index_config_path: PathBuf,

    #[arg(long, env = "CARDANO_INDEX_FUNDS_PATH", default_value = "data/linkage_funds.json")]
    pub funds_path: PathBuf,

    /// Lifetime of cached valuations and dynamic selections
    #[arg(long, env = "CARDANO_INDEX_CACHE_TTL_SECONDS", default_value_t = 300)]
    pub cache_ttl_seconds: u64,

    #[arg(long, env = "CARDANO_INDEX_FUNDS_CACHE_TTL_SECONDS", default_value_t = 300)]
    pub funds_cache_ttl_seconds: u64,

    #[arg(long, env = "CARDANO_INDEX_DATABASE_PATH", default_value = "cardano_index_data.db")]
    pub database_path: PathBuf,

    #[arg(
        long,
        env = "CARDANO_INDEX_QUERIER_ENABLED",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub querier_enabled: bool,

    #[arg(long, env = "CARDANO_INDEX_QUERIER_INTERVAL_MINUTES", default_value_t = 15)]
    pub querier_interval_minutes: u64,

    #[arg(long, env = "CARDANO_INDEX_QUERIER_STARTUP_DELAY_SECONDS", default_value_t = 30)]
    pub querier_startup_delay_seconds: u64,

    #[arg(long, env = "CARDANO_INDEX_QUERIER_ERROR_BACKOFF_SECONDS", default_value_t = 60)]
    pub querier_error_backoff_seconds: u64,

    /// IANA timezone that historical buckets are aligned to
    #[arg(long, env = "CARDANO_INDEX_HISTORY_TIMEZONE", default_value = "UTC")]
    pub history_timezone: String,
}

impl Settings {
    pub fn collector_config(&self) -> CollectorConfig {
        CollectorConfig {
            name: DEFAULT_QUERIER_NAME.to_string(),
            interval: Duration::from_secs(self.querier_interval_minutes * 60),
            startup_delay: Duration::from_secs(self.querier_startup_delay_seconds),
            error_backoff: Duration::from_secs(self.querier_error_backoff_seconds),
        }
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.history_timezone.parse::<Tz>().map_err(|e| {
            AppError::Config(format!(
                "Invalid history timezone '{}': {}",
                self.history_timezone, e
            ))
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.api_keys.iter().any(|k| !k.is_empty() && k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::try_parse_from(["cardano-index"]).unwrap();

        assert_eq!(settings.bind_address(), "0.0.0.0:8000");
        assert_eq!(settings.cache_ttl_seconds, 300);
        assert!(settings.querier_enabled);
        assert_eq!(settings.timezone().unwrap(), Tz::UTC);

        let collector = settings.collector_config();
        assert_eq!(collector.interval, Duration::from_secs(900));
        assert_eq!(collector.startup_delay, Duration::from_secs(30));
        assert_eq!(collector.error_backoff, Duration::from_secs(60));
    }

    #[test]
    fn test_flags_override_defaults() {
        let settings = Settings::try_parse_from([
            "cardano-index",
            "--api-keys",
            "alpha,beta",
            "--querier-enabled",
            "false",
            "--history-timezone",
            "Europe/Berlin",
        ])
        .unwrap();

        assert!(settings.is_valid_api_key("beta"));
        assert!(!settings.is_valid_api_key("gamma"));
        assert!(!settings.querier_enabled);
        assert_eq!(settings.timezone().unwrap(), chrono_tz::Europe::Berlin);
    }

    #[test]
    fn test_invalid_timezone() {
        let settings =
            Settings::try_parse_from(["cardano-index", "--history-timezone", "Mars/Base"]).unwrap();
        assert!(matches!(settings.timezone(), Err(AppError::Config(_))));
    }
}
