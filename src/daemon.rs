// =====================================================================================
// File: core-oracle/src/daemon.rs
// Description: Client for the rofl-appd signing/submission daemon
// Author: arkSong (arksong2018@gmail.com)
// =====================================================================================

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{OracleError, OracleResult};

const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(5);
const MAX_ATTEMPTS: u32 = 30;

/// Decodes a bech32-encoded ROFL app id into its raw byte form.
///
/// The raw bytes (not the bech32 string) are what feed into
/// [`crate::pair::TradingPair::feed_key`].
pub fn bech32_to_bytes(app_id: &str) -> OracleResult<Vec<u8>> {
    use bech32::FromBase32;

    let (_hrp, data, _variant) = bech32::decode(app_id)
        .map_err(|e| OracleError::config_error("app_id", format!("invalid bech32 app id: {e}")))?;
    Vec::<u8>::from_base32(&data)
        .map_err(|e| OracleError::config_error("app_id", format!("failed to convert app id: {e}")))
}

/// Strips an optional `0x`/`0X` prefix and lowercases, matching the
/// hex encoding rofl-appd expects for `to`/`data` fields on the wire.
pub fn strip_0x(addr: &str) -> String {
    addr.trim_start_matches("0x")
        .trim_start_matches("0X")
        .to_lowercase()
}

/// An unsigned EVM call, as the daemon's sign-submit endpoint expects it.
///
/// `to`, `value`, and `data` are already in their wire shapes: `to` is
/// hex without a `0x` prefix (empty for a contract deployment), `value`
/// is a decimal string, and `data` is lowercase hex without a prefix.
#[derive(Debug, Clone, Serialize)]
pub struct EthTxRequest {
    pub gas_limit: u64,
    #[serde(with = "to_hex")]
    pub to: Option<String>,
    #[serde(with = "decimal_string")]
    pub value: u128,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
}

mod to_hex {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(to: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(to.as_deref().unwrap_or(""))
    }
}

mod decimal_string {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }
}

mod hex_bytes {
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }
}

#[derive(Debug, Serialize)]
struct TxEnvelope {
    kind: &'static str,
    data: EthTxRequest,
}

#[derive(Debug, Serialize)]
struct SignSubmitRequest {
    tx: TxEnvelope,
    encrypted: bool,
}

#[derive(Debug, Deserialize)]
struct SignSubmitResponse {
    data: String,
}

/// The narrow surface this crate needs from rofl-appd: resolving the
/// app id (for feed key derivation) and submitting signed transactions.
#[async_trait]
pub trait SigningDaemon: Send + Sync {
    async fn fetch_app_id(&self) -> OracleResult<String>;
    async fn submit_tx(&self, tx: EthTxRequest) -> OracleResult<Vec<u8>>;
}

/// Talks to rofl-appd over a Unix domain socket, per the protocol
/// described for `/run/rofl-appd.sock`.
pub struct RoflAppdClient {
    client: Client<hyperlocal::UnixConnector, Full<Bytes>>,
    socket_path: String,
}

impl RoflAppdClient {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build(hyperlocal::UnixConnector),
            socket_path: socket_path.into(),
        }
    }

    pub fn default_socket() -> Self {
        Self::new("/run/rofl-appd.sock")
    }

    fn uri(&self, path: &str) -> hyper::Uri {
        hyperlocal::Uri::new(&self.socket_path, path).into()
    }

    async fn request_with_retry<F>(&self, build: F) -> OracleResult<Bytes>
    where
        F: Fn() -> OracleResult<Request<Full<Bytes>>>,
    {
        let mut delay = BASE_RETRY_DELAY;
        let mut last_err = None;

        for attempt in 1..=MAX_ATTEMPTS {
            let req = build()?;
            match self.client.request(req).await {
                Ok(response) => {
                    match response.into_body().collect().await {
                        Ok(collected) => return Ok(collected.to_bytes()),
                        Err(e) => last_err = Some(e.to_string()),
                    }
                }
                Err(e) => last_err = Some(e.to_string()),
            }

            warn!(attempt, "rofl-appd request failed, retrying");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_RETRY_DELAY);
        }

        Err(OracleError::submit_failure(
            "daemon",
            format!(
                "rofl-appd unreachable after {MAX_ATTEMPTS} attempts: {}",
                last_err.unwrap_or_default()
            ),
        ))
    }
}

#[async_trait]
impl SigningDaemon for RoflAppdClient {
    async fn fetch_app_id(&self) -> OracleResult<String> {
        let body = self
            .request_with_retry(|| {
                Request::builder()
                    .method(Method::GET)
                    .uri(self.uri("/rofl/v1/app/id"))
                    .body(Full::new(Bytes::new()))
                    .map_err(|e| OracleError::submit_failure("daemon", e.to_string()))
            })
            .await?;

        String::from_utf8(body.to_vec())
            .map(|s| s.trim().to_string())
            .map_err(|e| OracleError::submit_failure("daemon", format!("app id response not utf-8: {e}")))
    }

    async fn submit_tx(&self, tx: EthTxRequest) -> OracleResult<Vec<u8>> {
        let payload = SignSubmitRequest {
            tx: TxEnvelope { kind: "eth", data: tx },
            encrypted: false,
        };
        let body_bytes = serde_json::to_vec(&payload)
            .map_err(|e| OracleError::submit_failure("daemon", format!("encode failed: {e}")))?;

        let response_body = self
            .request_with_retry(|| {
                Request::builder()
                    .method(Method::POST)
                    .uri(self.uri("/rofl/v1/tx/sign-submit"))
                    .header("content-type", "application/json")
                    .body(Full::new(Bytes::from(body_bytes.clone())))
                    .map_err(|e| OracleError::submit_failure("daemon", e.to_string()))
            })
            .await?;

        let parsed: SignSubmitResponse = serde_json::from_slice(&response_body)
            .map_err(|e| OracleError::submit_failure("daemon", format!("bad sign-submit response: {e}")))?;

        let cbor_bytes = hex::decode(parsed.data.trim_start_matches("0x"))
            .map_err(|e| OracleError::submit_failure("daemon", format!("bad hex in response: {e}")))?;

        let mut decoded = Vec::new();
        ciborium::de::from_reader::<ciborium::value::Value, _>(cbor_bytes.as_slice())
            .map_err(|e| OracleError::submit_failure("daemon", format!("bad cbor in response: {e}")))
            .map(|value| {
                if let ciborium::value::Value::Bytes(b) = value {
                    decoded = b;
                }
            })?;

        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bech32_to_bytes_decodes_a_rofl_app_id() {
        use bech32::ToBase32;

        // A bech32-encoded 21-byte payload with hrp "rofl".
        let encoded = bech32::encode("rofl", [0xABu8; 21].to_base32(), bech32::Variant::Bech32)
            .unwrap();
        let decoded = bech32_to_bytes(&encoded).unwrap();
        assert_eq!(decoded, vec![0xABu8; 21]);
    }

    #[test]
    fn bech32_to_bytes_rejects_garbage() {
        assert!(bech32_to_bytes("not-bech32!!!").is_err());
    }
}
