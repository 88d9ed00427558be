use serde::{Deserialize, Serialize};

use super::{DESTINATION_CHAIN_ID, TokenDescriptor};

/// Fully specified request for a route into the destination chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub from_chain_id: u64,
    pub from_token_address: String,
    /// Integer amount in the source token's base units.
    pub from_amount_raw: String,
    pub from_address: String,
    pub to_chain_id: u64,
    pub to_token_address: String,
}

impl QuoteRequest {
    /// Build a request whose destination is always HyperEVM.
    pub fn to_destination(
        from_chain_id: u64,
        from_token_address: impl Into<String>,
        from_amount_raw: u128,
        from_address: impl Into<String>,
        to_token_address: impl Into<String>,
    ) -> Self {
        Self {
            from_chain_id,
            from_token_address: from_token_address.into(),
            from_amount_raw: from_amount_raw.to_string(),
            from_address: from_address.into(),
            to_chain_id: DESTINATION_CHAIN_ID,
            to_token_address: to_token_address.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDetails {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "logoURI", skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteAction {
    pub from_chain_id: u64,
    pub to_chain_id: u64,
    pub from_token: TokenDescriptor,
    pub to_token: TokenDescriptor,
    pub from_amount: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slippage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_address: Option<String>,
}

/// A gas or fee cost line. USD values arrive as decimal strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, rename = "amountUSD", skip_serializing_if = "Option::is_none")]
    pub amount_usd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<bool>,
}

impl CostEntry {
    pub fn usd(amount_usd: impl Into<String>) -> Self {
        Self {
            amount_usd: Some(amount_usd.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteEstimate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_amount: Option<String>,
    pub to_amount: String,
    pub to_amount_min: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_address: Option<String>,
    /// Seconds.
    #[serde(default)]
    pub execution_duration: f64,
    #[serde(default)]
    pub fee_costs: Vec<CostEntry>,
    #[serde(default)]
    pub gas_costs: Vec<CostEntry>,
}

/// One hop of a quoted route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludedStep {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub tool: String,
    #[serde(default)]
    pub tool_details: ToolDetails,
}

/// Unsigned transaction handed to the wallet for signing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default)]
    pub data: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
}

/// A priced route. Never mutated once received; replaced wholesale instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub tool: String,
    #[serde(default)]
    pub tool_details: ToolDetails,
    pub action: QuoteAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<QuoteEstimate>,
    #[serde(default)]
    pub included_steps: Vec<IncludedStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_request: Option<TransactionRequest>,
    /// The body exactly as the routing service sent it.
    #[serde(skip)]
    wire: Option<serde_json::Value>,
}

impl Quote {
    pub fn new(id: impl Into<String>, tool: ToolDetails, action: QuoteAction) -> Self {
        Self {
            id: id.into(),
            kind: "lifi".to_string(),
            tool: tool.key.clone(),
            tool_details: tool,
            action,
            estimate: None,
            included_steps: Vec::new(),
            transaction_request: None,
            wire: None,
        }
    }

    pub fn with_estimate(mut self, estimate: QuoteEstimate) -> Self {
        self.estimate = Some(estimate);
        self
    }

    pub fn with_included_step(mut self, step: IncludedStep) -> Self {
        self.included_steps.push(step);
        self
    }

    /// Decode a quote and remember the original body, so the same step can be
    /// sent back to the service without losing fields this crate doesn't model.
    pub fn from_wire(body: serde_json::Value) -> Result<Self, serde_json::Error> {
        let mut quote: Self = serde_json::from_value(body.clone())?;
        quote.wire = Some(body);
        Ok(quote)
    }

    /// Body to send back to the routing service for this step.
    pub fn wire_body(&self) -> Result<serde_json::Value, serde_json::Error> {
        match &self.wire {
            Some(body) => Ok(body.clone()),
            None => serde_json::to_value(self),
        }
    }

    pub fn to_amount(&self) -> Option<&str> {
        self.estimate.as_ref().map(|e| e.to_amount.as_str())
    }

    pub fn is_cross_chain(&self) -> bool {
        self.action.from_chain_id != self.action.to_chain_id
    }

    /// Display name of the bridge or DEX executing this step.
    pub fn tool_name(&self) -> &str {
        if self.tool_details.name.is_empty() {
            &self.tool
        } else {
            &self.tool_details.name
        }
    }
}
