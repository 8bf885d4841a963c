use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::protocol::ReadinessProbe;

/// Default Tuner port of the game
pub const DEFAULT_TUNER_PORT: u16 = 4318;

/// Largest accepted reconnect backoff multiplier
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

const CONFIG_DIR: &str = "civ5-client";
const CONFIG_FILE: &str = "config.json";

/// Reconnect delays between socket attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 3_000,
            multiplier: 1.5,
            max_delay_ms: 15_000,
        }
    }
}

/// Client configuration
///
/// Every field has a default, so a config file only needs the values it
/// overrides. Timings are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub tuner_addr: SocketAddr,
    /// Wait between sending a command and reading its reply
    pub settle_delay_ms: u64,
    pub read_timeout_ms: u64,
    pub tick_interval_ms: u64,
    pub mod_retry_delay_ms: u64,
    pub no_slot_retry_delay_ms: u64,
    pub backoff: BackoffConfig,
    pub command_response_size: usize,
    pub game_probe_response_size: usize,
    pub mod_probe_response_size: usize,
    pub grant_batch_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tuner_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_TUNER_PORT)),
            settle_delay_ms: 200,
            read_timeout_ms: 2_000,
            tick_interval_ms: 1_000,
            mod_retry_delay_ms: 4_000,
            no_slot_retry_delay_ms: 3_000,
            backoff: BackoffConfig::default(),
            command_response_size: 4 * 1024,
            game_probe_response_size: 20 * 1024,
            mod_probe_response_size: 100 * 1024,
            grant_batch_size: 10,
        }
    }
}

impl ClientConfig {
    /// `<user config dir>/civ5-client/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else the default path if it exists, else defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.grant_batch_size == 0 {
            return Err(Error::Config("grant_batch_size must be at least 1".into()));
        }
        let multiplier = self.backoff.multiplier;
        if !multiplier.is_finite() || !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
            return Err(Error::Config(format!(
                "backoff multiplier must be between 1.0 and {}, got {}",
                MAX_BACKOFF_MULTIPLIER, multiplier
            )));
        }
        if self.backoff.max_delay_ms < self.backoff.initial_delay_ms {
            return Err(Error::Config("backoff max delay is below the initial delay".into()));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn mod_retry_delay(&self) -> Duration {
        Duration::from_millis(self.mod_retry_delay_ms)
    }

    pub fn no_slot_retry_delay(&self) -> Duration {
        Duration::from_millis(self.no_slot_retry_delay_ms)
    }

    pub fn probe(&self) -> ReadinessProbe {
        ReadinessProbe {
            game_response_size: self.game_probe_response_size,
            mod_response_size: self.mod_probe_response_size,
        }
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: ClientConfig,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn tuner_addr(mut self, addr: SocketAddr) -> Self {
        self.config.tuner_addr = addr;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn mod_retry_delay(mut self, delay: Duration) -> Self {
        self.config.mod_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn no_slot_retry_delay(mut self, delay: Duration) -> Self {
        self.config.no_slot_retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn backoff(mut self, initial: Duration, multiplier: f64, max: Duration) -> Self {
        self.config.backoff = BackoffConfig {
            initial_delay_ms: initial.as_millis() as u64,
            multiplier,
            max_delay_ms: max.as_millis() as u64,
        };
        self
    }

    pub fn grant_batch_size(mut self, size: usize) -> Self {
        self.config.grant_batch_size = size;
        self
    }

    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.tuner_addr.to_string(), "127.0.0.1:4318");
        assert_eq!(config.settle_delay(), Duration::from_millis(200));
        assert_eq!(config.read_timeout(), Duration::from_secs(2));
        assert_eq!(config.grant_batch_size, 10);
        assert_eq!(config.probe().mod_response_size, 100 * 1024);
    }

    #[test]
    fn test_partial_file() {
        let config = ClientConfig::from_json_str(
            r#"{"tuner_addr": "127.0.0.1:5000", "tick_interval_ms": 4000, "backoff": {"max_delay_ms": 60000}}"#,
        )
        .unwrap();
        assert_eq!(config.tuner_addr.port(), 5000);
        assert_eq!(config.tick_interval(), Duration::from_secs(4));
        assert_eq!(config.backoff.initial_delay_ms, 3_000);
        assert_eq!(config.backoff.max_delay_ms, 60_000);
        assert_eq!(config.settle_delay_ms, 200);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(ClientConfig::from_json_str("{\"grant_batch_size\": 0}"), Err(Error::Config(_))));
        assert!(matches!(ClientConfig::from_json_str("not json"), Err(Error::Config(_))));
        assert!(ClientConfig::from_file("/nonexistent/civ5-client.json").is_err());

        // 1e300 would overflow the reconnect delay
        for multiplier in ["0.5", "1e300", "10.5"] {
            let json = format!("{{\"backoff\": {{\"multiplier\": {}}}}}", multiplier);
            assert!(matches!(ClientConfig::from_json_str(&json), Err(Error::Config(_))), "{}", multiplier);
        }
        assert!(ClientConfig::from_json_str("{\"backoff\": {\"multiplier\": 10.0}}").is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ClientBuilder::new()
            .tick_interval(Duration::from_millis(50))
            .settle_delay(Duration::ZERO)
            .grant_batch_size(3)
            .build()
            .unwrap();
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.settle_delay_ms, 0);
        assert_eq!(config.grant_batch_size, 3);

        assert!(ClientBuilder::new()
            .backoff(Duration::from_secs(10), 2.0, Duration::from_secs(1))
            .build()
            .is_err());
    }
}
