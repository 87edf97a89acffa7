// =====================================================================================
// File: core-oracle/src/contract.rs
// Description: On-chain aggregator/directory contract surface
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::sync::Arc;

use async_trait::async_trait;
use ethers::abi::Abi;
use ethers::contract::Contract;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Bytes, H256};

use crate::error::{OracleError, OracleResult};

/// The tuple returned by `latestRoundData()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: u64,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u64,
}

/// View/write surface of a per-pair aggregator contract.
///
/// Write operations return calldata rather than a submitted
/// transaction hash: signing and submission belong to the daemon
/// (`daemon.rs`), not to this client.
#[async_trait]
pub trait AggregatorContract: Send + Sync {
    fn address(&self) -> String;
    async fn decimals(&self) -> OracleResult<u8>;
    async fn description(&self) -> OracleResult<String>;
    async fn latest_round_data(&self) -> OracleResult<RoundData>;

    fn encode_set_decimals(&self, decimals: u8) -> Vec<u8>;
    fn encode_set_description(&self, description: &str) -> Vec<u8>;
    fn encode_submit_observation(
        &self,
        round_id: u64,
        price: i128,
        first_ts: u64,
        last_ts: u64,
    ) -> Vec<u8>;
}

/// Directory surface used to resolve or register a pair's aggregator address.
#[async_trait]
pub trait DirectoryContract: Send + Sync {
    async fn feed_address(&self, feed_key: [u8; 32]) -> OracleResult<Option<Address>>;
    fn encode_add_feed(&self, description: &str, initial_address: Address, finalized: bool) -> Vec<u8>;
    fn address(&self) -> String;
}

const AGGREGATOR_ABI_JSON: &str = r#"[
    {"type":"function","name":"decimals","inputs":[],"outputs":[{"type":"uint8"}],"stateMutability":"view"},
    {"type":"function","name":"description","inputs":[],"outputs":[{"type":"string"}],"stateMutability":"view"},
    {"type":"function","name":"setDecimals","inputs":[{"type":"uint8"}],"outputs":[],"stateMutability":"nonpayable"},
    {"type":"function","name":"setDescription","inputs":[{"type":"string"}],"outputs":[],"stateMutability":"nonpayable"},
    {"type":"function","name":"latestRoundData","inputs":[],"outputs":[
        {"type":"uint80","name":"roundId"},
        {"type":"int256","name":"answer"},
        {"type":"uint256","name":"startedAt"},
        {"type":"uint256","name":"updatedAt"},
        {"type":"uint80","name":"answeredInRound"}
    ],"stateMutability":"view"},
    {"type":"function","name":"submitObservation","inputs":[
        {"type":"uint256","name":"roundId"},
        {"type":"int256","name":"price"},
        {"type":"uint64","name":"firstTimestamp"},
        {"type":"uint64","name":"lastTimestamp"}
    ],"outputs":[],"stateMutability":"nonpayable"}
]"#;

const DIRECTORY_ABI_JSON: &str = r#"[
    {"type":"function","name":"feeds","inputs":[{"type":"bytes32"}],"outputs":[{"type":"address"}],"stateMutability":"view"},
    {"type":"function","name":"addFeed","inputs":[
        {"type":"string","name":"description"},
        {"type":"address","name":"initialAddress"},
        {"type":"bool","name":"finalized"}
    ],"outputs":[],"stateMutability":"nonpayable"}
]"#;

fn parse_abi(json: &str) -> Abi {
    serde_json::from_str(json).expect("static ABI fragment must parse")
}

/// `ethers`-backed aggregator contract client, reading via a JSON-RPC
/// provider and encoding writes for the signing daemon to submit.
pub struct EthersAggregatorContract {
    contract: Contract<Provider<Http>>,
}

impl EthersAggregatorContract {
    pub fn new(provider: Arc<Provider<Http>>, address: Address) -> Self {
        let abi = parse_abi(AGGREGATOR_ABI_JSON);
        Self {
            contract: Contract::new(address, abi, provider),
        }
    }
}

#[async_trait]
impl AggregatorContract for EthersAggregatorContract {
    fn address(&self) -> String {
        format!("{:?}", self.contract.address())
    }

    async fn decimals(&self) -> OracleResult<u8> {
        self.contract
            .method::<_, u8>("decimals", ())
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))?
            .call()
            .await
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))
    }

    async fn description(&self) -> OracleResult<String> {
        self.contract
            .method::<_, String>("description", ())
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))?
            .call()
            .await
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))
    }

    async fn latest_round_data(&self) -> OracleResult<RoundData> {
        let (round_id, answer, started_at, updated_at, answered_in_round): (
            ethers::types::U256,
            ethers::types::I256,
            ethers::types::U256,
            ethers::types::U256,
            ethers::types::U256,
        ) = self
            .contract
            .method("latestRoundData", ())
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))?
            .call()
            .await
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))?;

        Ok(RoundData {
            round_id: round_id.as_u64(),
            answer: answer.as_i128(),
            started_at: started_at.as_u64(),
            updated_at: updated_at.as_u64(),
            answered_in_round: answered_in_round.as_u64(),
        })
    }

    fn encode_set_decimals(&self, decimals: u8) -> Vec<u8> {
        self.contract
            .method::<_, ()>("setDecimals", decimals)
            .expect("setDecimals must encode")
            .calldata()
            .map(|b: Bytes| b.to_vec())
            .unwrap_or_default()
    }

    fn encode_set_description(&self, description: &str) -> Vec<u8> {
        self.contract
            .method::<_, ()>("setDescription", description.to_string())
            .expect("setDescription must encode")
            .calldata()
            .map(|b: Bytes| b.to_vec())
            .unwrap_or_default()
    }

    fn encode_submit_observation(
        &self,
        round_id: u64,
        price: i128,
        first_ts: u64,
        last_ts: u64,
    ) -> Vec<u8> {
        self.contract
            .method::<_, ()>(
                "submitObservation",
                (
                    ethers::types::U256::from(round_id),
                    ethers::types::I256::from(price),
                    first_ts,
                    last_ts,
                ),
            )
            .expect("submitObservation must encode")
            .calldata()
            .map(|b: Bytes| b.to_vec())
            .unwrap_or_default()
    }
}

/// `ethers`-backed directory contract client.
pub struct EthersDirectoryContract {
    contract: Contract<Provider<Http>>,
}

impl EthersDirectoryContract {
    pub fn new(provider: Arc<Provider<Http>>, address: Address) -> Self {
        let abi = parse_abi(DIRECTORY_ABI_JSON);
        Self {
            contract: Contract::new(address, abi, provider),
        }
    }
}

#[async_trait]
impl DirectoryContract for EthersDirectoryContract {
    async fn feed_address(&self, feed_key: [u8; 32]) -> OracleResult<Option<Address>> {
        let key = H256::from(feed_key);
        let address: Address = self
            .contract
            .method("feeds", key)
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))?
            .call()
            .await
            .map_err(|e| OracleError::contract_unavailable(self.address(), e.to_string()))?;

        if address == Address::zero() {
            Ok(None)
        } else {
            Ok(Some(address))
        }
    }

    fn encode_add_feed(&self, description: &str, initial_address: Address, finalized: bool) -> Vec<u8> {
        self.contract
            .method::<_, ()>(
                "addFeed",
                (description.to_string(), initial_address, finalized),
            )
            .expect("addFeed must encode")
            .calldata()
            .map(|b: Bytes| b.to_vec())
            .unwrap_or_default()
    }

    fn address(&self) -> String {
        format!("{:?}", self.contract.address())
    }
}

/// Fetches the current network gas price for sizing transactions.
///
/// Per the daemon wire protocol, the gas price itself is never
/// transmitted to rofl-appd (only `gas_limit`); this helper exists so
/// callers can log/estimate locally without that value crossing the
/// daemon boundary.
pub async fn current_gas_price(provider: &Provider<Http>) -> OracleResult<ethers::types::U256> {
    provider
        .get_gas_price()
        .await
        .map_err(|e| OracleError::contract_unavailable("provider", e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_abi_fragments_parse() {
        let _ = parse_abi(AGGREGATOR_ABI_JSON);
        let _ = parse_abi(DIRECTORY_ABI_JSON);
    }
}
