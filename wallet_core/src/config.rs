//! Wallet engine configuration with TOML file support.

use std::time::Duration;

use lattice_types::{Amount, NetworkId};
use lattice_utils::LogFormat;
use serde::{Deserialize, Serialize};

use crate::WalletError;

/// Configuration for the wallet engine.
///
/// Can be loaded from a TOML file via [`WalletConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Durations are milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Network the wallet builds blocks for.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// How long a single work request may take.
    #[serde(default = "default_work_timeout_ms")]
    pub work_timeout_ms: u64,

    /// Work requests per submission before giving up with `WorkUnavailable`.
    #[serde(default = "default_work_attempts")]
    pub work_attempts: u32,

    /// How long a single submit call may take.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,

    /// Submit calls per block before giving up with `NetworkTimeout`.
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,

    /// First resubmission delay; doubles after every attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// How often the account monitor polls the node for frontiers.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Smallest receivable the auto-receiver picks up.
    #[serde(default = "default_auto_receive_min_amount")]
    pub auto_receive_min_amount: Amount,

    /// Delay between auto-receive passes.
    #[serde(default = "default_auto_receive_interval_ms")]
    pub auto_receive_interval_ms: u64,

    /// Log format: "human" or "json".
    #[serde(default)]
    pub log_format: LogFormat,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_network() -> NetworkId {
    NetworkId::Dev
}

fn default_work_timeout_ms() -> u64 {
    30_000
}

fn default_work_attempts() -> u32 {
    3
}

fn default_submit_timeout_ms() -> u64 {
    10_000
}

fn default_submit_attempts() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_backoff_max_ms() -> u64 {
    8_000
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_auto_receive_min_amount() -> Amount {
    Amount::new(1)
}

fn default_auto_receive_interval_ms() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WalletConfig {
    pub fn from_toml_file(path: &str) -> Result<Self, WalletError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| WalletError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, WalletError> {
        let config: Self = toml::from_str(s).map_err(|e| WalletError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("WalletConfig is always serializable to TOML")
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<(), WalletError> {
        let positive = [
            ("work_timeout_ms", self.work_timeout_ms),
            ("work_attempts", u64::from(self.work_attempts)),
            ("submit_timeout_ms", self.submit_timeout_ms),
            ("submit_attempts", u64::from(self.submit_attempts)),
            ("poll_interval_ms", self.poll_interval_ms),
            ("auto_receive_interval_ms", self.auto_receive_interval_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(WalletError::Config(format!("{name} must be positive")));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(WalletError::Config(format!(
                "backoff_base_ms ({}) exceeds backoff_max_ms ({})",
                self.backoff_base_ms, self.backoff_max_ms
            )));
        }
        Ok(())
    }

    pub fn work_timeout(&self) -> Duration {
        Duration::from_millis(self.work_timeout_ms)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn auto_receive_interval(&self) -> Duration {
        Duration::from_millis(self.auto_receive_interval_ms)
    }

    /// Delay before resubmission number `attempt` (0-based), doubling from
    /// the base and capped at the maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(
            self.backoff_base_ms
                .saturating_mul(factor)
                .min(self.backoff_max_ms),
        )
    }

    /// Short timings for tests and demos against an in-memory node.
    pub fn fast() -> Self {
        Self {
            work_timeout_ms: 2_000,
            submit_timeout_ms: 1_000,
            backoff_base_ms: 5,
            backoff_max_ms: 50,
            poll_interval_ms: 20,
            auto_receive_interval_ms: 50,
            ..Self::default()
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: default_network(),
            work_timeout_ms: default_work_timeout_ms(),
            work_attempts: default_work_attempts(),
            submit_timeout_ms: default_submit_timeout_ms(),
            submit_attempts: default_submit_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            auto_receive_min_amount: default_auto_receive_min_amount(),
            auto_receive_interval_ms: default_auto_receive_interval_ms(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = WalletConfig::default();
        let parsed = WalletConfig::from_toml_str(&config.to_toml_string()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = WalletConfig::from_toml_str("").unwrap();
        assert_eq!(config.network, NetworkId::Dev);
        assert_eq!(config.auto_receive_interval(), Duration::from_secs(10));
        assert_eq!(config.log_format, LogFormat::Human);
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            network = "live"
            submit_attempts = 9
            log_format = "json"
        "#;
        let config = WalletConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.network, NetworkId::Live);
        assert_eq!(config.submit_attempts, 9);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.work_attempts, 3);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = WalletConfig::from_toml_str("work_attempts = 0").unwrap_err();
        assert!(matches!(err, WalletError::Config(msg) if msg.contains("work_attempts")));
    }

    #[test]
    fn backoff_base_above_max_rejected() {
        let config = WalletConfig {
            backoff_base_ms: 10,
            backoff_max_ms: 5,
            ..WalletConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let config = WalletConfig {
            backoff_base_ms: 100,
            backoff_max_ms: 1_000,
            ..WalletConfig::default()
        };
        assert_eq!(config.backoff(0), Duration::from_millis(100));
        assert_eq!(config.backoff(2), Duration::from_millis(400));
        assert_eq!(config.backoff(10), Duration::from_millis(1_000));
        assert_eq!(config.backoff(200), Duration::from_millis(1_000));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "poll_interval_ms = 250").unwrap();
        let config = WalletConfig::from_toml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_returns_config_error() {
        let err = WalletConfig::from_toml_file("/nonexistent/lattice.toml").unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
    }
}
