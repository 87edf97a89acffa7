// =====================================================================================
// File: core-oracle/src/lib.rs
// Description: Off-chain aggregation engine for a TEE-hosted price oracle
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

//! Fetches prices from multiple independent sources, aggregates them
//! into a single median with outlier rejection and drift limiting,
//! and submits accepted observations to an on-chain aggregator
//! contract through a TEE-hosted signing daemon.

pub mod adapter;
pub mod adapters;
pub mod aggregator;
pub mod config;
pub mod contract;
pub mod coordinator;
pub mod daemon;
pub mod error;
pub mod health;
pub mod observer;
pub mod orchestrator;
pub mod pair;
pub mod stablecoin;

pub use adapter::{AdapterRegistry, SharedHttpClient, SourceAdapter};
pub use aggregator::{AggregationMetadata, AggregationOutcome, PriceAggregator};
pub use config::OracleConfig;
pub use contract::{AggregatorContract, DirectoryContract, RoundData};
pub use coordinator::BatchFetchCoordinator;
pub use daemon::{EthTxRequest, RoflAppdClient, SigningDaemon};
pub use error::{OracleError, OracleResult};
pub use health::{SourceHealth, SourceHealthTracker};
pub use observer::{Observation, PairObserver};
pub use orchestrator::OracleOrchestrator;
pub use pair::TradingPair;
pub use stablecoin::StablecoinRateCache;
