//! Minimal EVM JSON-RPC access: balances, allowances and chain id checks.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{ConfigError, WalletError};
use crate::model::TokenDescriptor;
use crate::services::is_valid_evm_address;

const BALANCE_OF_SELECTOR: &str = "70a08231";
const ALLOWANCE_SELECTOR: &str = "dd62ed3e";
const APPROVE_SELECTOR: &str = "095ea7b3";

#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("RPC transport error: {0}")]
    Transport(String),

    #[error("RPC endpoint returned HTTP {0}")]
    Http(u16),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl From<RpcError> for WalletError {
    fn from(err: RpcError) -> Self {
        WalletError::Rpc {
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

impl RpcResponse {
    fn into_result(self) -> Result<Value, RpcError> {
        if let Some(error) = self.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| RpcError::InvalidResponse("missing result".to_string()))
    }
}

#[derive(Debug, Clone)]
pub struct EvmRpc {
    http: reqwest::Client,
}

impl EvmRpc {
    pub fn new(timeout: Duration) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                key: "SLYCK_RPC_URLS".to_string(),
                message: format!("HTTP client init failed: {e}"),
            })?;
        Ok(Self { http })
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, RpcError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Http(status.as_u16()));
        }
        response
            .json::<Value>()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    pub async fn call(&self, url: &str, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });
        let value = self.post(url, &body).await?;
        let response: RpcResponse = serde_json::from_value(value)
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        response.into_result()
    }

    /// Send calls as one JSON-RPC batch. Results come back in call order.
    pub async fn batch(
        &self,
        url: &str,
        calls: &[(&str, Value)],
    ) -> Result<Vec<Result<Value, RpcError>>, RpcError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }
        let body = Value::Array(
            calls
                .iter()
                .enumerate()
                .map(|(id, (method, params))| {
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "method": method,
                        "params": params,
                    })
                })
                .collect(),
        );
        let value = self.post(url, &body).await?;
        let responses: Vec<RpcResponse> = serde_json::from_value(value)
            .map_err(|e| RpcError::InvalidResponse(format!("expected a batch response: {e}")))?;

        let mut results: Vec<Result<Value, RpcError>> = (0..calls.len())
            .map(|_| Err(RpcError::InvalidResponse("missing batch entry".to_string())))
            .collect();
        for response in responses {
            let Some(slot) = response
                .id
                .and_then(|id| usize::try_from(id).ok())
                .filter(|id| *id < results.len())
            else {
                continue;
            };
            results[slot] = response.into_result();
        }
        Ok(results)
    }

    pub async fn chain_id(&self, url: &str) -> Result<u64, RpcError> {
        let value = self.call(url, "eth_chainId", json!([])).await?;
        let raw = value
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("eth_chainId is not a string".into()))?;
        let id = parse_hex_quantity(raw)?;
        u64::try_from(id).map_err(|_| RpcError::InvalidResponse(format!("chain id {raw} overflows")))
    }

    /// Balances of `owner` for each token, `None` where a lookup failed.
    pub async fn balances(
        &self,
        url: &str,
        owner: &str,
        tokens: &[TokenDescriptor],
    ) -> Result<Vec<Option<u128>>, RpcError> {
        let balance_of = balance_of_calldata(owner)?;
        let calls: Vec<(&str, Value)> = tokens
            .iter()
            .map(|token| {
                if token.is_native() {
                    ("eth_getBalance", json!([owner, "latest"]))
                } else {
                    (
                        "eth_call",
                        json!([{ "to": token.address, "data": balance_of }, "latest"]),
                    )
                }
            })
            .collect();

        let results = self.batch(url, &calls).await?;
        Ok(results
            .into_iter()
            .map(|result| {
                result
                    .ok()
                    .and_then(|value| value.as_str().map(str::to_string))
                    .and_then(|raw| parse_hex_quantity(&raw).ok())
            })
            .collect())
    }

    pub async fn allowance(
        &self,
        url: &str,
        token: &str,
        owner: &str,
        spender: &str,
    ) -> Result<u128, RpcError> {
        let data = allowance_calldata(owner, spender)?;
        let value = self
            .call(url, "eth_call", json!([{ "to": token, "data": data }, "latest"]))
            .await?;
        let raw = value
            .as_str()
            .ok_or_else(|| RpcError::InvalidResponse("eth_call result is not a string".into()))?;
        // Unlimited approvals don't fit in u128.
        Ok(parse_hex_quantity(raw).unwrap_or(u128::MAX))
    }
}

fn encode_address(address: &str) -> Result<String, RpcError> {
    if !is_valid_evm_address(address) {
        return Err(RpcError::InvalidAddress(address.to_string()));
    }
    Ok(format!("{:0>64}", address.trim()[2..].to_ascii_lowercase()))
}

pub fn balance_of_calldata(owner: &str) -> Result<String, RpcError> {
    Ok(format!("0x{}{}", BALANCE_OF_SELECTOR, encode_address(owner)?))
}

pub fn allowance_calldata(owner: &str, spender: &str) -> Result<String, RpcError> {
    Ok(format!(
        "0x{}{}{}",
        ALLOWANCE_SELECTOR,
        encode_address(owner)?,
        encode_address(spender)?
    ))
}

pub fn approve_calldata(spender: &str, amount: u128) -> Result<String, RpcError> {
    Ok(format!(
        "0x{}{}{:064x}",
        APPROVE_SELECTOR,
        encode_address(spender)?,
        amount
    ))
}

/// Parse a `0x` hex quantity or ABI word into a u128.
pub fn parse_hex_quantity(raw: &str) -> Result<u128, RpcError> {
    let digits = raw
        .trim()
        .strip_prefix("0x")
        .ok_or_else(|| RpcError::InvalidResponse(format!("'{raw}' is not 0x-prefixed")))?;
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        return Err(RpcError::InvalidResponse(format!("'{raw}' overflows u128")));
    }
    u128::from_str_radix(digits, 16).map_err(|e| RpcError::InvalidResponse(format!("'{raw}': {e}")))
}
