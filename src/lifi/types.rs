//! LI.FI REST wire shapes that don't map onto a domain model type.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{ChainDescriptor, TokenDescriptor};

/// Quote error code LI.FI returns when no bridge or DEX can serve a pair.
pub const NO_ROUTE_ERROR_CODE: i64 = 1002;

#[derive(Debug, Clone, Deserialize)]
pub struct ChainsResponse {
    #[serde(default)]
    pub chains: Vec<ChainDescriptor>,
}

/// `GET /tokens` keys token lists by the chain id rendered as a string.
#[derive(Debug, Clone, Deserialize)]
pub struct TokensResponse {
    #[serde(default)]
    pub tokens: HashMap<String, Vec<TokenDescriptor>>,
}

impl TokensResponse {
    pub fn into_chain(mut self, chain_id: u64) -> Vec<TokenDescriptor> {
        self.tokens.remove(&chain_id.to_string()).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
}

/// Parameters for `GET /status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub tx_hash: String,
    pub from_chain: u64,
    pub to_chain: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bridge: Option<String>,
}

/// Overall transfer state reported by `GET /status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    NotFound,
    Invalid,
    Pending,
    Done,
    Failed,
    #[serde(other)]
    Unknown,
}

impl TransferState {
    pub fn is_final(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Invalid)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLeg {
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub tx_link: Option<String>,
    #[serde(default)]
    pub chain_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    pub status: TransferState,
    #[serde(default)]
    pub substatus: Option<String>,
    #[serde(default)]
    pub substatus_message: Option<String>,
    #[serde(default)]
    pub sending: Option<TransferLeg>,
    #[serde(default)]
    pub receiving: Option<TransferLeg>,
    #[serde(default)]
    pub lifi_explorer_link: Option<String>,
}

impl TransferStatus {
    /// Human readable reason, preferring LI.FI's own message.
    pub fn describe(&self) -> String {
        self.substatus_message
            .clone()
            .or_else(|| self.substatus.clone())
            .unwrap_or_else(|| format!("{:?}", self.status))
    }
}
