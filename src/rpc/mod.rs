use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use anyhow::{Context, Result};
use jsonrpsee::core::client::{ClientT, Error as ClientError};
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use serde::{Deserialize, Serialize};

/// Failure of a single JSON-RPC call, keeping the provider's error code when
/// the node answered with one.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{method} failed: {message}")]
pub struct RpcFailure {
    pub method: &'static str,
    pub message: String,
    pub code: Option<i32>,
}

impl RpcFailure {
    fn from_client(method: &'static str, err: ClientError) -> Self {
        match err {
            ClientError::Call(object) => Self {
                method,
                message: object.message().to_string(),
                code: Some(object.code()),
            },
            other => Self {
                method,
                message: other.to_string(),
                code: None,
            },
        }
    }

    fn malformed(method: &'static str, message: String) -> Self {
        Self {
            method,
            message,
            code: None,
        }
    }
}

#[derive(Clone)]
pub struct RpcClient {
    inner: HttpClient,
    timeout: Duration,
}

impl RpcClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        assert!(!endpoint.is_empty(), "RPC endpoint must be provided");
        assert!(
            timeout >= Duration::from_millis(100),
            "Timeout below 100ms is unsafe"
        );

        let client = HttpClientBuilder::default()
            .request_timeout(timeout)
            .build(endpoint)
            .with_context(|| format!("Failed to build RPC client for {endpoint}"))?;

        Ok(Self {
            inner: client,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn block_number(&self) -> Result<u64, RpcFailure> {
        let quantity: String = self
            .inner
            .request("eth_blockNumber", rpc_params![])
            .await
            .map_err(|err| RpcFailure::from_client("eth_blockNumber", err))?;
        parse_quantity(&quantity)
            .ok_or_else(|| RpcFailure::malformed("eth_blockNumber", format!("bad quantity {quantity}")))
    }

    /// `eth_call` against the latest block.
    pub async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, RpcFailure> {
        let request = CallRequest {
            from: None,
            to,
            data,
            value: None,
        };
        self.inner
            .request("eth_call", rpc_params![request, "latest"])
            .await
            .map_err(|err| RpcFailure::from_client("eth_call", err))
    }

    /// `eth_sendTransaction`; the provider behind the endpoint signs for `from`.
    pub async fn send_transaction(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        value: U256,
    ) -> Result<TxHash, RpcFailure> {
        let request = CallRequest {
            from: Some(from),
            to,
            data,
            value: (!value.is_zero()).then(|| format!("{value:#x}")),
        };
        self.inner
            .request("eth_sendTransaction", rpc_params![request])
            .await
            .map_err(|err| RpcFailure::from_client("eth_sendTransaction", err))
    }

    pub async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> Result<Option<ReceiptPayload>, RpcFailure> {
        self.inner
            .request("eth_getTransactionReceipt", rpc_params![tx_hash])
            .await
            .map_err(|err| RpcFailure::from_client("eth_getTransactionReceipt", err))
    }
}

#[derive(Debug, Serialize)]
struct CallRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<Address>,
    to: Address,
    data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptPayload {
    pub transaction_hash: TxHash,
    #[serde(default)]
    pub block_number: Option<String>,
    /// `0x1` on success, `0x0` on revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<String>,
}

impl ReceiptPayload {
    pub fn succeeded(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => parse_quantity(status).is_some_and(|value| value == 1),
            None => true,
        }
    }

    pub fn block(&self) -> Option<u64> {
        self.block_number.as_deref().and_then(parse_quantity)
    }
}

pub fn parse_quantity(value: &str) -> Option<u64> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
