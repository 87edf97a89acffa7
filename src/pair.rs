// =====================================================================================
// File: core-oracle/src/pair.rs
// Description: Trading pair identity and feed key derivation
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::fmt;
use std::str::FromStr;

use ethers::utils::keccak256;

use crate::error::OracleError;

/// An aggregated trading pair, e.g. `btc/usd`.
///
/// `base` and `quote` are always stored lowercased so that two pairs
/// built from differently-cased input compare and hash equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradingPair {
    pub base: String,
    pub quote: String,
}

impl TradingPair {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into().to_lowercase(),
            quote: quote.into().to_lowercase(),
        }
    }

    /// The feed directory key for this pair: `keccak256(lowercase_hex(app_id) || "/" || self)`.
    ///
    /// `app_id_bytes` is the raw (non-bech32) app id, as returned by
    /// [`crate::daemon::bech32_to_bytes`].
    pub fn feed_key(&self, app_id_bytes: &[u8]) -> [u8; 32] {
        let preimage = format!("{}/{}", hex::encode(app_id_bytes), self);
        keccak256(preimage.as_bytes())
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aggregated/{}/{}", self.base, self.quote)
    }
}

impl FromStr for TradingPair {
    type Err = OracleError;

    /// Parses the `"base/quote"` form (the shape used in configuration
    /// and CLI input), distinct from the canonical `"aggregated/base/quote"`
    /// form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(base), Some(quote), None) if !base.is_empty() && !quote.is_empty() => {
                Ok(TradingPair::new(base, quote))
            }
            _ => Err(OracleError::config_error(
                "pair",
                format!("invalid pair format '{s}', expected 'base/quote'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_lowercase() {
        let p = TradingPair::new("BTC", "USD");
        assert_eq!(p.base, "btc");
        assert_eq!(p.quote, "usd");
    }

    #[test]
    fn display_uses_aggregated_form() {
        let p = TradingPair::new("btc", "usd");
        assert_eq!(p.to_string(), "aggregated/btc/usd");
    }

    #[test]
    fn from_str_parses_slash_form() {
        let p: TradingPair = "ETH/USD".parse().unwrap();
        assert_eq!(p, TradingPair::new("eth", "usd"));
    }

    #[test]
    fn from_str_rejects_malformed_input() {
        assert!("btcusd".parse::<TradingPair>().is_err());
        assert!("btc/usd/extra".parse::<TradingPair>().is_err());
        assert!("/usd".parse::<TradingPair>().is_err());
    }

    #[test]
    fn feed_key_is_deterministic_and_distinct_per_pair() {
        let app_id = [0xABu8; 21];
        let btc_usd = TradingPair::new("btc", "usd");
        let eth_usd = TradingPair::new("eth", "usd");

        let k1 = btc_usd.feed_key(&app_id);
        let k2 = btc_usd.feed_key(&app_id);
        assert_eq!(k1, k2);

        let k3 = eth_usd.feed_key(&app_id);
        assert_ne!(k1, k3);
    }
}
