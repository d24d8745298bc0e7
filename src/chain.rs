//! JSON-RPC client for the ledger node.
//!
//! Every operation issues exactly one request. Retry policy belongs to the
//! callers (see [`crate::puzzle::PuzzleReader`]).

use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::trace;

use crate::error::ChainUnavailable;

pub const DEFAULT_NODE_URL: &str = "http://localhost:8545";
pub const DEFAULT_NETWORK_ID: u64 = 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transaction as returned by `eth_getTransactionByBlockNumberAndIndex`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransactionRecord {
    pub hash: B256,
    #[serde(default)]
    pub from: Option<Address>,
    /// `None` for contract creations
    #[serde(default)]
    pub to: Option<Address>,
}

/// Receipt as returned by `eth_getTransactionReceipt`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptRecord {
    /// Set only when the transaction created a contract
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default)]
    pub logs: Vec<LogRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LogRecord {
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub topics: Vec<B256>,
}

/// Read-only view of the ledger used by the miner.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Height of the latest block
    async fn block_height(&self) -> Result<u64, ChainUnavailable>;

    /// Transaction at `index` inside block `height`, if any
    async fn transaction_at(
        &self,
        height: u64,
        index: u64,
    ) -> Result<Option<TransactionRecord>, ChainUnavailable>;

    /// Receipt of a mined transaction, if any
    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptRecord>, ChainUnavailable>;

    /// `eth_call` against the latest block; returns the raw `0x`-prefixed hex result
    async fn call_contract(&self, to: Address, data: &[u8]) -> Result<String, ChainUnavailable>;
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// HTTP JSON-RPC client. The network id doubles as the request id.
pub struct ChainClient {
    url: String,
    network_id: u64,
    client: reqwest::Client,
}

impl ChainClient {
    pub fn new(url: impl Into<String>, network_id: u64) -> Result<Self, ChainUnavailable> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            url: url.into(),
            network_id,
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one call. A `null` or absent result comes back as `None`.
    async fn call(&self, method: &str, params: Value) -> Result<Option<Value>, ChainUnavailable> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.network_id,
            method,
            params,
        };
        trace!(target: "miner::chain", method, "rpc request");

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChainUnavailable::Status(status));
        }

        let body: JsonRpcResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(ChainUnavailable::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        Ok(body.result.filter(|value| !value.is_null()))
    }

    async fn call_required(&self, method: &str, params: Value) -> Result<Value, ChainUnavailable> {
        self.call(method, params)
            .await?
            .ok_or_else(|| ChainUnavailable::Malformed(format!("{method} returned no result")))
    }
}

#[async_trait]
impl LedgerRpc for ChainClient {
    async fn block_height(&self) -> Result<u64, ChainUnavailable> {
        let result = self.call_required("eth_blockNumber", json!([])).await?;
        quantity_from_value(&result)
    }

    async fn transaction_at(
        &self,
        height: u64,
        index: u64,
    ) -> Result<Option<TransactionRecord>, ChainUnavailable> {
        let params = json!([to_quantity(height), to_quantity(index)]);
        self.call("eth_getTransactionByBlockNumberAndIndex", params)
            .await?
            .map(record_from_value)
            .transpose()
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptRecord>, ChainUnavailable> {
        self.call("eth_getTransactionReceipt", json!([tx_hash]))
            .await?
            .map(record_from_value)
            .transpose()
    }

    async fn call_contract(&self, to: Address, data: &[u8]) -> Result<String, ChainUnavailable> {
        let params = json!([
            { "to": to, "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        match self.call_required("eth_call", params).await? {
            Value::String(raw) => Ok(raw),
            other => Err(ChainUnavailable::Malformed(format!(
                "eth_call result is not a string: {other}"
            ))),
        }
    }
}

fn record_from_value<T: DeserializeOwned>(value: Value) -> Result<T, ChainUnavailable> {
    serde_json::from_value(value).map_err(|err| ChainUnavailable::Malformed(err.to_string()))
}

fn to_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// Parse a `0x`-prefixed hex quantity such as `"0x1b4"`.
pub fn parse_quantity(raw: &str) -> Option<u64> {
    let digits = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

fn quantity_from_value(value: &Value) -> Result<u64, ChainUnavailable> {
    value
        .as_str()
        .and_then(parse_quantity)
        .ok_or_else(|| ChainUnavailable::Malformed(format!("invalid hex quantity: {value}")))
}
