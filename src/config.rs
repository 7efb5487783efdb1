//! Wallet configuration
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Every field has a default suitable for mainnet-ish timings, so embedding
//! applications can start from `WalletConfig::default()` and override what
//! they need.

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Time between flushes of the message queue into one transaction.
    pub flush_interval_ms: u64,
    /// Message queue capacity. `submit`/`submit_async` fail fast with
    /// `QueueFull` once this many messages are waiting for a flush.
    pub queue_capacity: usize,
    /// Minimum delay between confirmation lookups for one transaction.
    pub confirm_min_interval_secs: u64,
    /// Overall window to observe a terminal status before the ticket is
    /// abandoned as timed out.
    pub confirm_timeout_secs: u64,
    /// Cap on concurrently polled confirmation tickets.
    pub max_in_flight_confirmations: usize,
    /// Blocks past the last known height after which an unincluded
    /// transaction expires. Zero disables the timeout height.
    pub tx_timeout_height_offset: u64,
    /// Minimum time between latest-block-height queries; heights read within
    /// the window come from the cache.
    pub block_height_refresh_ms: u64,
    /// Fee charged per message in the batch, in `fee_denom`.
    pub fee_per_message: u64,
    /// Denomination of the fee coin.
    pub fee_denom: String,
    /// Gas allotted per message in the batch.
    pub gas_per_message: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 100,
            queue_capacity: 1000,
            confirm_min_interval_secs: 5,
            confirm_timeout_secs: 300,
            max_in_flight_confirmations: 64,
            tx_timeout_height_offset: 30,
            block_height_refresh_ms: 5000,
            fee_per_message: 100_000_000,
            fee_denom: "swth".to_string(),
            gas_per_message: 1_000_000,
        }
    }
}

impl WalletConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let config: WalletConfig =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_ms == 0 {
            anyhow::bail!("flush_interval_ms must be non-zero");
        }
        if self.queue_capacity == 0 {
            anyhow::bail!("queue_capacity must be non-zero");
        }
        if self.max_in_flight_confirmations == 0 {
            anyhow::bail!("max_in_flight_confirmations must be non-zero");
        }
        if self.confirm_timeout_secs < self.confirm_min_interval_secs {
            anyhow::bail!("confirm_timeout_secs must cover at least one retry interval");
        }
        if self.fee_denom.is_empty() {
            anyhow::bail!("fee_denom must be set");
        }
        Ok(())
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn confirm_min_interval(&self) -> Duration {
        Duration::from_secs(self.confirm_min_interval_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }

    pub fn block_height_refresh(&self) -> Duration {
        Duration::from_millis(self.block_height_refresh_ms)
    }
}

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Expand `${VAR_NAME}` placeholders from the environment; unset variables
/// expand to the empty string.
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
