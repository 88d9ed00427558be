use std::io;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use super::frontend::{BridgeHost, WizardFrontend};
use crate::amount;
use crate::error::ExecutionError;
use crate::model::{ExecutionProgressEvent, Quote, Route};
use crate::services::{BridgeServices, ExecutionUpdate, RateChangeRequest, with_cancel};

const UPDATE_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    AutoAccept,
    Confirm,
}

/// Decides whether a changed output amount needs the user's consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateChangePolicy {
    threshold: Decimal,
}

impl Default for RateChangePolicy {
    fn default() -> Self {
        Self {
            threshold: dec!(0.01),
        }
    }
}

fn relative_change(old: &str, new: &str) -> Option<Decimal> {
    let old_value = amount::parse_decimal(old);
    let new_value = amount::parse_decimal(new);
    if let (Some(old), Some(new)) = (old_value, new_value) {
        if old.is_zero() {
            return None;
        }
        return (new - old).abs().checked_div(old);
    }

    // Beyond Decimal's range: relative change is still meaningful in f64.
    let old: f64 = old.trim().parse().ok()?;
    let new: f64 = new.trim().parse().ok()?;
    if !old.is_finite() || !new.is_finite() || old == 0.0 {
        return None;
    }
    Decimal::try_from(((new - old) / old).abs()).ok()
}

impl RateChangePolicy {
    pub fn new(threshold: Decimal) -> Self {
        Self { threshold }
    }

    /// Auto-accept strictly below the threshold; a zero or unreadable old
    /// amount always asks.
    pub fn decide(&self, old_to_amount: &str, new_to_amount: &str) -> RateDecision {
        match relative_change(old_to_amount, new_to_amount) {
            Some(change) if change < self.threshold => RateDecision::AutoAccept,
            _ => RateDecision::Confirm,
        }
    }
}

/// Heading of the execution view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Headline {
    Executing,
    Failed,
    Complete,
}

impl Headline {
    pub fn title(self) -> &'static str {
        match self {
            Self::Executing => "Executing Bridge...",
            Self::Failed => "Execution Failed",
            Self::Complete => "Bridge Complete!",
        }
    }

    pub fn subtitle(self) -> &'static str {
        match self {
            Self::Executing => "Please confirm transactions in your wallet",
            Self::Failed => "Something went wrong during execution",
            Self::Complete => "Your tokens have been bridged successfully",
        }
    }
}

#[derive(Debug)]
pub enum ExecuteOutcome {
    Completed(Route),
    Failed(ExecutionError),
    Cancelled,
}

pub struct ExecuteStep<'a> {
    services: &'a BridgeServices,
    frontend: &'a dyn WizardFrontend,
    host: &'a dyn BridgeHost,
    policy: RateChangePolicy,
    cancel: CancellationToken,
}

impl<'a> ExecuteStep<'a> {
    pub fn new(
        services: &'a BridgeServices,
        frontend: &'a dyn WizardFrontend,
        host: &'a dyn BridgeHost,
        policy: RateChangePolicy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            services,
            frontend,
            host,
            policy,
            cancel,
        }
    }

    /// Execute `quote`, offering a full re-run after each failure.
    pub async fn run(&self, quote: &Quote) -> io::Result<ExecuteOutcome> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            tracing::info!(quote_id = %quote.id, attempt, "Starting execution");
            let route = self.services.execution.to_route(quote);
            let (result, events) = self.run_attempt(route).await?;

            match result {
                Ok(route) => {
                    self.host.on_success();
                    let events = route.progress_events();
                    self.frontend
                        .show_progress(Headline::Complete, &events, None)
                        .await?;
                    tracing::info!(route_id = %route.id, "Bridge complete");
                    return Ok(ExecuteOutcome::Completed(route));
                }
                Err(err) => {
                    self.host.on_error(&err);
                    if self.cancel.is_cancelled() {
                        tracing::info!("Execution cancelled");
                        return Ok(ExecuteOutcome::Cancelled);
                    }
                    tracing::warn!("Execution failed: {}", err);
                    let message = err.to_string();
                    self.frontend
                        .show_progress(Headline::Failed, &events, Some(&message))
                        .await?;
                    let retry = with_cancel(&self.cancel, self.frontend.confirm("Try again?", true))
                        .await
                        .transpose()?;
                    // The attempt already reported to the host; a cancelled
                    // prompt leaves the step without a terminal outcome.
                    match retry {
                        None => return Ok(ExecuteOutcome::Cancelled),
                        Some(_) if self.cancel.is_cancelled() => {
                            return Ok(ExecuteOutcome::Cancelled);
                        }
                        Some(false) => return Ok(ExecuteOutcome::Failed(err)),
                        Some(true) => {}
                    }
                }
            }
        }
    }

    /// One execution attempt. Returns the result and the last rendered rows.
    async fn run_attempt(
        &self,
        route: Route,
    ) -> io::Result<(Result<Route, ExecutionError>, Vec<ExecutionProgressEvent>)> {
        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let mut updates = ReceiverStream::new(rx);
        let execution = self
            .services
            .execution
            .execute(route, tx, self.cancel.clone());
        tokio::pin!(execution);

        let mut events = Vec::new();
        self.frontend
            .show_progress(Headline::Executing, &events, None)
            .await?;

        let result = loop {
            tokio::select! {
                biased;
                Some(update) = updates.next() => {
                    self.handle_update(update, &mut events).await?;
                }
                result = &mut execution => break result,
            }
        };

        // Snapshots sent just before completion are still buffered.
        let mut rx = updates.into_inner();
        while let Ok(update) = rx.try_recv() {
            match update {
                ExecutionUpdate::Progress(route) => events = route.progress_events(),
                ExecutionUpdate::RateChange(request) => request.respond(false),
            }
        }
        Ok((result, events))
    }

    async fn handle_update(
        &self,
        update: ExecutionUpdate,
        events: &mut Vec<ExecutionProgressEvent>,
    ) -> io::Result<()> {
        match update {
            ExecutionUpdate::Progress(route) => {
                *events = route.progress_events();
                self.frontend
                    .show_progress(Headline::Executing, events, None)
                    .await
            }
            ExecutionUpdate::RateChange(request) => self.negotiate(request).await,
        }
    }

    async fn negotiate(&self, request: RateChangeRequest) -> io::Result<()> {
        match self
            .policy
            .decide(&request.old_to_amount, &request.new_to_amount)
        {
            RateDecision::AutoAccept => {
                tracing::info!(
                    old = %request.old_to_amount,
                    new = %request.new_to_amount,
                    "Accepting small exchange rate change"
                );
                request.respond(true);
                Ok(())
            }
            RateDecision::Confirm => {
                let display =
                    amount::display_amount(&request.new_to_amount, request.token.decimals)
                        .unwrap_or_else(|| request.new_to_amount.clone());
                let prompt = format!(
                    "Exchange rate changed. New amount: {} {}. Continue?",
                    display, request.token.symbol
                );
                match with_cancel(&self.cancel, self.frontend.confirm(&prompt, false)).await {
                    Some(Ok(accepted)) => {
                        tracing::info!(accepted, "Exchange rate change answered");
                        request.respond(accepted);
                        Ok(())
                    }
                    Some(Err(e)) => {
                        request.respond(false);
                        Err(e)
                    }
                    None => {
                        request.respond(false);
                        Ok(())
                    }
                }
            }
        }
    }
}
