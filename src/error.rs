//! Error types for Slyck.

use std::time::Duration;

use serde::Serialize;

/// Top-level error type for the bridge wizard.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Quote error: {0}")]
    Quote(#[from] QuoteError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure domains surfaced to frontends and logs.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WizardErrorDomain {
    Config,
    Directory,
    Quote,
    Execution,
    Wallet,
    Validation,
    Io,
}

/// Structured error payload for frontends and log consumers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WizardErrorPayload {
    pub domain: WizardErrorDomain,
    pub code: &'static str,
    pub retryable: bool,
    pub message: String,
}

impl WizardErrorPayload {
    fn new(
        domain: WizardErrorDomain,
        code: &'static str,
        retryable: bool,
        message: impl Into<String>,
    ) -> Self {
        Self {
            domain,
            code,
            retryable,
            message: message.into(),
        }
    }

    /// Serialize for single-line log output.
    pub fn to_log_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"domain\":\"{:?}\",\"code\":\"{}\",\"retryable\":{}}}",
                self.domain, self.code, self.retryable
            )
        })
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chain and token directory errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("Failed to load {resource}: {reason}")]
    Request { resource: String, reason: String },

    #[error("Directory rejected request for {resource} (HTTP {status}): {message}")]
    Rejected {
        resource: String,
        status: u16,
        message: String,
    },

    #[error("Invalid {resource} response: {reason}")]
    InvalidResponse { resource: String, reason: String },

    #[error("Balances are not available for chain {chain_id}: {reason}")]
    BalancesUnavailable { chain_id: u64, reason: String },

    #[error("Directory request cancelled")]
    Cancelled,
}

/// Quote service errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum QuoteError {
    #[error("Quote request failed: {reason}")]
    Request { reason: String },

    #[error("Quote rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("No route available: {message}")]
    NoRoute { message: String },

    #[error("Invalid quote: {reason}")]
    InvalidResponse { reason: String },

    #[error("Quote request cancelled")]
    Cancelled,
}

/// Route execution errors. Each one terminates a single execution attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecutionError {
    #[error("Execution request failed: {reason}")]
    Transport { reason: String },

    #[error("Execution rejected by routing service (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Route is not executable: {reason}")]
    InvalidRoute { reason: String },

    #[error("Step {step} failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Exchange rate change rejected (new amount {new_amount} {symbol})")]
    RateChangeRejected { symbol: String, new_amount: String },

    #[error("Transaction {tx_hash} did not settle within {waited:?}")]
    StatusTimeout { tx_hash: String, waited: Duration },

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Execution cancelled")]
    Cancelled,
}

/// Wallet session and signer errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("Transaction rejected: {reason}")]
    Rejected { reason: String },

    #[error("RPC error: {reason}")]
    Rpc { reason: String },
}

/// Input validation errors. These never reach a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in all fields (missing: {})", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid amount '{value}': {reason}")]
    InvalidAmount { value: String, reason: String },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Token {address} is not available on the selected chain")]
    UnknownToken { address: String },

    #[error("Token {symbol} has no known balance")]
    NoBalance { symbol: String },
}

impl QuoteError {
    /// Whether the same request may succeed if tried again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Request { .. } | Self::NoRoute { .. } | Self::Cancelled
        ) || matches!(self, Self::Rejected { status, .. } if *status >= 500 || *status == 429)
    }

    fn to_error_payload(&self) -> WizardErrorPayload {
        let code = match self {
            Self::Request { .. } => "quote.request_failed",
            Self::Rejected { .. } => "quote.rejected",
            Self::NoRoute { .. } => "quote.no_route",
            Self::InvalidResponse { .. } => "quote.invalid_response",
            Self::Cancelled => "quote.cancelled",
        };
        WizardErrorPayload::new(
            WizardErrorDomain::Quote,
            code,
            self.is_retryable(),
            self.to_string(),
        )
    }
}

impl ExecutionError {
    fn to_error_payload(&self) -> WizardErrorPayload {
        let (code, retryable) = match self {
            Self::Transport { .. } => ("execution.transport", true),
            Self::Rejected { status, .. } => ("execution.rejected", *status >= 500),
            Self::InvalidRoute { .. } => ("execution.invalid_route", false),
            Self::StepFailed { .. } => ("execution.step_failed", true),
            Self::RateChangeRejected { .. } => ("execution.rate_change_rejected", true),
            Self::StatusTimeout { .. } => ("execution.status_timeout", true),
            Self::Wallet(WalletError::Rejected { .. }) => ("wallet.transaction_rejected", true),
            Self::Wallet(_) => ("wallet.unavailable", true),
            Self::Cancelled => ("execution.cancelled", true),
        };
        let domain = match self {
            Self::Wallet(_) => WizardErrorDomain::Wallet,
            _ => WizardErrorDomain::Execution,
        };
        WizardErrorPayload::new(domain, code, retryable, self.to_string())
    }
}

impl Error {
    /// Map errors into a structured surface for frontends and logs.
    pub fn to_error_payload(&self) -> WizardErrorPayload {
        match self {
            Self::Config(err) => {
                let code = match err {
                    ConfigError::InvalidValue { .. } => "config.invalid_value",
                    ConfigError::ParseError(_) => "config.parse_error",
                    ConfigError::Io(_) => "config.io_error",
                };
                WizardErrorPayload::new(WizardErrorDomain::Config, code, false, err.to_string())
            }
            Self::Directory(err) => {
                let (code, retryable) = match err {
                    DirectoryError::Request { .. } => ("directory.request_failed", true),
                    DirectoryError::Rejected { status, .. } => {
                        ("directory.rejected", *status >= 500 || *status == 429)
                    }
                    DirectoryError::InvalidResponse { .. } => ("directory.invalid_response", false),
                    DirectoryError::BalancesUnavailable { .. } => {
                        ("directory.balances_unavailable", false)
                    }
                    DirectoryError::Cancelled => ("directory.cancelled", true),
                };
                WizardErrorPayload::new(
                    WizardErrorDomain::Directory,
                    code,
                    retryable,
                    err.to_string(),
                )
            }
            Self::Quote(err) => err.to_error_payload(),
            Self::Execution(err) => err.to_error_payload(),
            Self::Wallet(err) => {
                let code = match err {
                    WalletError::InvalidAddress(_) => "wallet.invalid_address",
                    WalletError::Rejected { .. } => "wallet.transaction_rejected",
                    WalletError::Rpc { .. } => "wallet.rpc_error",
                };
                let retryable = !matches!(err, WalletError::InvalidAddress(_));
                WizardErrorPayload::new(WizardErrorDomain::Wallet, code, retryable, err.to_string())
            }
            Self::Validation(err) => {
                let code = match err {
                    ValidationError::MissingFields(_) => "validation.missing_fields",
                    ValidationError::InvalidAmount { .. } => "validation.invalid_amount",
                    ValidationError::ZeroAmount => "validation.zero_amount",
                    ValidationError::UnknownToken { .. } => "validation.unknown_token",
                    ValidationError::NoBalance { .. } => "validation.no_balance",
                };
                WizardErrorPayload::new(
                    WizardErrorDomain::Validation,
                    code,
                    false,
                    err.to_string(),
                )
            }
            Self::Io(err) => WizardErrorPayload::new(
                WizardErrorDomain::Io,
                "io.error",
                true,
                err.to_string(),
            ),
        }
    }
}
