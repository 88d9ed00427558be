//! Collaborator contracts consumed by the bridge wizard.
//!
//! Every asynchronous call takes a [`CancellationToken`]; the wizard cancels
//! the token when it leaves the step that issued the call.

mod wallet;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::{DirectoryError, ExecutionError, QuoteError};
use crate::model::{ChainDescriptor, ChainType, Quote, QuoteRequest, Route, TokenDescriptor};

pub use self::wallet::{WalletSession, WalletStatus, is_valid_evm_address, is_valid_tx_hash};

/// Source of supported chains.
#[async_trait]
pub trait ChainDirectory: Send + Sync {
    /// List chains of the given types. Callers filter to mainnet themselves.
    async fn list_chains(
        &self,
        chain_types: &[ChainType],
        cancel: &CancellationToken,
    ) -> Result<Vec<ChainDescriptor>, DirectoryError>;
}

/// Source of per-chain token lists and wallet balances.
#[async_trait]
pub trait TokenDirectory: Send + Sync {
    async fn list_tokens(
        &self,
        chain_id: u64,
        cancel: &CancellationToken,
    ) -> Result<Vec<TokenDescriptor>, DirectoryError>;

    /// Return `tokens` with `balance` populated for `address`.
    async fn list_balances(
        &self,
        address: &str,
        tokens: Vec<TokenDescriptor>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TokenDescriptor>, DirectoryError>;
}

#[async_trait]
pub trait QuoteService: Send + Sync {
    async fn get_quote(
        &self,
        request: &QuoteRequest,
        cancel: &CancellationToken,
    ) -> Result<Quote, QuoteError>;
}

/// Drives a route to on-chain completion.
///
/// Progress snapshots and rate-change negotiations are sent on `updates`.
/// A dropped receiver must not abort execution; an unanswered rate change is
/// treated as rejected.
#[async_trait]
pub trait ExecutionService: Send + Sync {
    fn to_route(&self, quote: &Quote) -> Route {
        Route::from_quote(quote)
    }

    async fn execute(
        &self,
        route: Route,
        updates: mpsc::Sender<ExecutionUpdate>,
        cancel: CancellationToken,
    ) -> Result<Route, ExecutionError>;
}

/// Message from a running execution to the wizard.
#[derive(Debug)]
pub enum ExecutionUpdate {
    /// Full snapshot of the route; replaces any previous snapshot.
    Progress(Route),
    /// The realized output differs from the quoted one.
    RateChange(RateChangeRequest),
}

/// A pending exchange-rate negotiation awaiting a yes/no answer.
#[derive(Debug)]
pub struct RateChangeRequest {
    pub token: TokenDescriptor,
    pub old_to_amount: String,
    pub new_to_amount: String,
    reply: oneshot::Sender<bool>,
}

impl RateChangeRequest {
    pub fn new(
        token: TokenDescriptor,
        old_to_amount: impl Into<String>,
        new_to_amount: impl Into<String>,
    ) -> (Self, oneshot::Receiver<bool>) {
        let (reply, rx) = oneshot::channel();
        (
            Self {
                token,
                old_to_amount: old_to_amount.into(),
                new_to_amount: new_to_amount.into(),
                reply,
            },
            rx,
        )
    }

    pub fn respond(self, accept: bool) {
        if self.reply.send(accept).is_err() {
            tracing::debug!("Rate change answer dropped: execution no longer waiting");
        }
    }
}

/// Ask the wizard to accept a rate change. Returns `false` when nobody answers.
pub async fn negotiate_rate_change(
    updates: &mpsc::Sender<ExecutionUpdate>,
    token: TokenDescriptor,
    old_to_amount: &str,
    new_to_amount: &str,
    cancel: &CancellationToken,
) -> Result<bool, ExecutionError> {
    let (request, answer) = RateChangeRequest::new(token, old_to_amount, new_to_amount);
    if updates
        .send(ExecutionUpdate::RateChange(request))
        .await
        .is_err()
    {
        return Ok(false);
    }
    match with_cancel(cancel, answer).await {
        Some(Ok(accepted)) => Ok(accepted),
        Some(Err(_)) => Ok(false),
        None => Err(ExecutionError::Cancelled),
    }
}

/// Run `fut` unless `cancel` fires first.
pub async fn with_cancel<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        output = fut => Some(output),
    }
}

/// The collaborator set a wizard runs against.
#[derive(Clone)]
pub struct BridgeServices {
    pub chains: Arc<dyn ChainDirectory>,
    pub tokens: Arc<dyn TokenDirectory>,
    pub quotes: Arc<dyn QuoteService>,
    pub execution: Arc<dyn ExecutionService>,
}

impl std::fmt::Debug for BridgeServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeServices").finish_non_exhaustive()
    }
}
