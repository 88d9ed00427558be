//! Chain, token, quote and route data exchanged with routing services.

mod quote;
mod route;

use serde::{Deserialize, Serialize};

pub use self::quote::{
    CostEntry, IncludedStep, Quote, QuoteAction, QuoteEstimate, QuoteRequest, ToolDetails,
    TransactionRequest,
};
pub use self::route::{
    ExecutionProgressEvent, Process, ProcessKind, ProcessStatus, Route, RouteStep, Severity,
    StepExecution,
};

/// HyperEVM, the only bridge destination.
pub const DESTINATION_CHAIN_ID: u64 = 999;
pub const DESTINATION_CHAIN_NAME: &str = "HyperEVM";
pub const DESTINATION_RPC_URL: &str = "https://rpc.hyperliquid.xyz/evm";

/// Placeholder address routing services use for a chain's native asset.
pub const NATIVE_TOKEN_ADDRESS: &str = "0x0000000000000000000000000000000000000000";
const NATIVE_TOKEN_ALIAS: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";

/// Chain execution model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChainType {
    Evm,
    Svm,
    #[serde(other)]
    Unknown,
}

impl ChainType {
    /// Chain types offered as bridge sources.
    pub const SOURCE_TYPES: [ChainType; 2] = [ChainType::Evm, ChainType::Svm];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Evm => "EVM",
            Self::Svm => "SVM",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Wallet-facing chain metadata (RPC and explorer endpoints).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMetadata {
    #[serde(default)]
    pub rpc_urls: Vec<String>,
    #[serde(default)]
    pub block_explorer_urls: Vec<String>,
}

/// A chain supported by the routing service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    pub id: u64,
    #[serde(default)]
    pub key: String,
    pub name: String,
    pub chain_type: ChainType,
    #[serde(default)]
    pub mainnet: bool,
    #[serde(default, rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metamask: Option<ChainMetadata>,
}

impl ChainDescriptor {
    pub fn new(id: u64, name: impl Into<String>, chain_type: ChainType) -> Self {
        let name = name.into();
        Self {
            id,
            key: name.to_ascii_lowercase(),
            name,
            chain_type,
            mainnet: true,
            logo_url: None,
            metamask: None,
        }
    }

    pub fn rpc_url(&self) -> Option<&str> {
        self.metamask
            .as_ref()
            .and_then(|meta| meta.rpc_urls.first())
            .map(String::as_str)
    }

    /// Explorer link for a transaction hash, when the chain publishes one.
    pub fn tx_link(&self, tx_hash: &str) -> Option<String> {
        let explorer = self.metamask.as_ref()?.block_explorer_urls.first()?;
        Some(format!("{}/tx/{}", explorer.trim_end_matches('/'), tx_hash))
    }
}

/// A token on a specific chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub address: String,
    pub chain_id: u64,
    pub symbol: String,
    pub decimals: u8,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, rename = "priceUSD", skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<String>,
    /// Wallet balance in base units, when balances were requested.
    #[serde(skip)]
    pub balance: Option<u128>,
}

impl TokenDescriptor {
    pub fn new(chain_id: u64, address: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        let symbol = symbol.into();
        Self {
            address: address.into(),
            chain_id,
            name: symbol.clone(),
            symbol,
            decimals,
            logo_url: None,
            price_usd: None,
            balance: None,
        }
    }

    pub fn with_logo(mut self, url: impl Into<String>) -> Self {
        self.logo_url = Some(url.into());
        self
    }

    pub fn with_balance(mut self, balance: u128) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn has_logo(&self) -> bool {
        self.logo_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    pub fn is_native(&self) -> bool {
        let address = self.address.to_ascii_lowercase();
        address == NATIVE_TOKEN_ADDRESS || address == NATIVE_TOKEN_ALIAS
    }

    /// Case-insensitive address match (EVM addresses are checksum-cased).
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address.trim())
    }
}
