// =====================================================================================
// File: core-oracle/src/config.rs
// Description: Configuration surface for the oracle aggregation engine
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;
use std::time::Duration;

use crate::error::{OracleError, OracleResult};
use crate::pair::TradingPair;

/// The recognized configuration surface.
///
/// Populating this struct from CLI flags or environment variables is
/// out of scope here — that parsing step belongs to a binary this
/// crate does not ship. `OracleConfig` is the seam that binary would
/// construct and hand to [`crate::orchestrator::OracleOrchestrator`].
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Pairs to track, e.g. `[("btc","usd"), ("eth","usd")]`.
    pub pairs: Vec<TradingPair>,
    /// Enabled source adapter names, in priority order.
    pub sources: Vec<String>,
    /// Minimum number of valid sources required to aggregate a pair.
    pub min_sources: usize,
    /// Maximum allowed deviation from the initial median, in percent.
    pub max_deviation_pct: f64,
    /// Maximum allowed drift from the previous accepted price, in
    /// percent. `0.0` is treated as "no drift limit".
    pub drift_limit_pct: f64,
    /// How often to run a fetch cycle.
    pub fetch_period: Duration,
    /// How often to submit accumulated observations on-chain.
    pub submit_period: Duration,
    /// Per-request fetch timeout.
    pub fetch_timeout: Duration,
    /// Directory contract address (required).
    pub price_feed_address: String,
    /// Optional pre-assigned aggregator address for the first
    /// configured pair; all other pairs are resolved/deployed via the
    /// directory contract.
    pub address: Option<String>,
    /// Per-source API keys, keyed by source name.
    pub api_keys: HashMap<String, String>,
    /// Network name or RPC URL.
    pub network: String,
}

impl OracleConfig {
    pub fn drift_limit(&self) -> Option<f64> {
        if self.drift_limit_pct > 0.0 {
            Some(self.drift_limit_pct)
        } else {
            None
        }
    }

    pub fn validate(&self) -> OracleResult<()> {
        if self.pairs.is_empty() {
            return Err(OracleError::config_error("pairs", "at least one pair is required"));
        }
        if self.sources.is_empty() {
            return Err(OracleError::config_error("sources", "at least one source is required"));
        }
        if self.min_sources == 0 {
            return Err(OracleError::config_error("min_sources", "must be at least 1"));
        }
        if self.min_sources > self.sources.len() {
            return Err(OracleError::config_error(
                "min_sources",
                format!(
                    "min_sources ({}) exceeds configured source count ({})",
                    self.min_sources,
                    self.sources.len()
                ),
            ));
        }
        if self.fetch_period.is_zero() {
            return Err(OracleError::config_error("fetch_period", "must be at least 1 second"));
        }
        if self.submit_period < Duration::from_secs(6) {
            return Err(OracleError::config_error(
                "submit_period",
                "must be at least 6 seconds",
            ));
        }
        if self.price_feed_address.is_empty() {
            return Err(OracleError::config_error(
                "price_feed_address",
                "directory contract address is required",
            ));
        }
        Ok(())
    }
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            pairs: Vec::new(),
            sources: Vec::new(),
            min_sources: 2,
            max_deviation_pct: 5.0,
            drift_limit_pct: 10.0,
            fetch_period: Duration::from_secs(60),
            submit_period: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(10),
            price_feed_address: String::new(),
            address: None,
            api_keys: HashMap::new(),
            network: "sapphire-testnet".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> OracleConfig {
        OracleConfig {
            pairs: vec![TradingPair::new("btc", "usd")],
            sources: vec!["binance".into(), "coinbase".into(), "kraken".into()],
            price_feed_address: "0xabc".into(),
            ..Default::default()
        }
    }

    #[test]
    fn default_min_sources_is_reasonable() {
        assert_eq!(OracleConfig::default().min_sources, 2);
    }

    #[test]
    fn default_drift_limit_is_ten_percent() {
        let config = valid_config();
        assert_eq!(config.drift_limit(), Some(10.0));
    }

    #[test]
    fn drift_limit_zero_means_unbounded() {
        let mut config = valid_config();
        config.drift_limit_pct = 0.0;
        assert_eq!(config.drift_limit(), None);
    }

    #[test]
    fn drift_limit_positive_is_some() {
        let mut config = valid_config();
        config.drift_limit_pct = 2.5;
        assert_eq!(config.drift_limit(), Some(2.5));
    }

    #[test]
    fn validate_rejects_empty_pairs() {
        let mut config = valid_config();
        config.pairs.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_min_sources_exceeding_source_count() {
        let mut config = valid_config();
        config.min_sources = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_submit_period_below_floor() {
        let mut config = valid_config();
        config.submit_period = Duration::from_secs(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_well_formed_config() {
        assert!(valid_config().validate().is_ok());
    }
}
