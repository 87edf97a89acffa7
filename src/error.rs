// =====================================================================================
// File: core-oracle/src/error.rs
// Description: Error types for the oracle aggregation engine
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::collections::HashMap;

use thiserror::Error;

/// Result type for oracle operations
pub type OracleResult<T> = Result<T, OracleError>;

/// Oracle aggregation engine error kinds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    /// A source adapter failed to produce a usable price for a pair.
    #[error("fetch failure: {source}: {pair}: {message}")]
    FetchFailure {
        source: String,
        pair: String,
        message: String,
    },

    /// Fewer sources reported valid prices than `min_sources` requires.
    #[error("insufficient sources for {pair}: required {required}, valid {valid}")]
    InsufficientSources {
        pair: String,
        required: usize,
        valid: usize,
    },

    /// Too many sources were dropped as outliers to still meet `min_sources`.
    #[error("too many outliers for {pair}: required {required}, remaining {remaining}, dropped {dropped:?}")]
    TooManyOutliers {
        pair: String,
        required: usize,
        remaining: usize,
        dropped: HashMap<String, f64>,
    },

    /// The aggregated price moved further from `previous` than `drift_limit_pct` allows.
    #[error(
        "drift too large for {pair}: {drift_pct:.4}% exceeds limit {limit_pct:.4}% \
         (previous={previous}, candidate={candidate})"
    )]
    DriftTooLarge {
        pair: String,
        drift_pct: f64,
        limit_pct: f64,
        previous: f64,
        candidate: f64,
    },

    /// The signing daemon or chain rejected a submission.
    #[error("submit failure for {pair}: {message}")]
    SubmitFailure { pair: String, message: String },

    /// A configuration value was missing or invalid.
    #[error("configuration error: {field}: {message}")]
    ConfigError { field: String, message: String },

    /// An on-chain contract could not be reached or resolved.
    #[error("contract unavailable: {pair}: {message}")]
    ContractUnavailable { pair: String, message: String },
}

impl OracleError {
    pub fn fetch_failure<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        source: S1,
        pair: S2,
        message: S3,
    ) -> Self {
        Self::FetchFailure {
            source: source.into(),
            pair: pair.into(),
            message: message.into(),
        }
    }

    pub fn insufficient_sources<S: Into<String>>(pair: S, required: usize, valid: usize) -> Self {
        Self::InsufficientSources {
            pair: pair.into(),
            required,
            valid,
        }
    }

    pub fn too_many_outliers<S: Into<String>>(
        pair: S,
        required: usize,
        remaining: usize,
        dropped: HashMap<String, f64>,
    ) -> Self {
        Self::TooManyOutliers {
            pair: pair.into(),
            required,
            remaining,
            dropped,
        }
    }

    pub fn drift_too_large<S: Into<String>>(
        pair: S,
        drift_pct: f64,
        limit_pct: f64,
        previous: f64,
        candidate: f64,
    ) -> Self {
        Self::DriftTooLarge {
            pair: pair.into(),
            drift_pct,
            limit_pct,
            previous,
            candidate,
        }
    }

    pub fn submit_failure<S1: Into<String>, S2: Into<String>>(pair: S1, message: S2) -> Self {
        Self::SubmitFailure {
            pair: pair.into(),
            message: message.into(),
        }
    }

    pub fn config_error<S1: Into<String>, S2: Into<String>>(field: S1, message: S2) -> Self {
        Self::ConfigError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn contract_unavailable<S1: Into<String>, S2: Into<String>>(pair: S1, message: S2) -> Self {
        Self::ContractUnavailable {
            pair: pair.into(),
            message: message.into(),
        }
    }

    /// Stable string identifier for metrics/log correlation.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::FetchFailure { .. } => "FETCH_FAILURE",
            Self::InsufficientSources { .. } => "INSUFFICIENT_SOURCES",
            Self::TooManyOutliers { .. } => "TOO_MANY_OUTLIERS",
            Self::DriftTooLarge { .. } => "DRIFT_TOO_LARGE",
            Self::SubmitFailure { .. } => "SUBMIT_FAILURE",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::ContractUnavailable { .. } => "CONTRACT_UNAVAILABLE",
        }
    }

    /// Errors that abort startup rather than just skip a tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigError { .. } | Self::ContractUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregation_errors_are_not_fatal() {
        let e = OracleError::insufficient_sources("btc/usd", 3, 1);
        assert_eq!(e.error_code(), "INSUFFICIENT_SOURCES");
        assert!(!e.is_fatal());
    }

    #[test]
    fn config_and_contract_errors_are_fatal() {
        assert!(OracleError::config_error("pairs", "empty").is_fatal());
        assert!(OracleError::contract_unavailable("btc/usd", "not deployed").is_fatal());
    }

    #[test]
    fn drift_too_large_formats_percentages() {
        let e = OracleError::drift_too_large("eth/usd", 12.5, 10.0, 100.0, 112.5);
        let msg = e.to_string();
        assert!(msg.contains("12.5000%"));
        assert!(msg.contains("10.0000%"));
        assert!(msg.contains("previous=100"));
        assert!(msg.contains("candidate=112.5"));
    }
}
