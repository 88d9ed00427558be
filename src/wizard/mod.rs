//! Four-step bridge wizard: Connect → Configure → Review → Execute.
//!
//! [`WizardState`] is the pure transition table. [`BridgeWizard`] drives it
//! against a [`WizardFrontend`], racing every step against a wallet
//! disconnect. Each step runs under a child of the wizard's root
//! cancellation token, cancelled when the step is left.

pub mod configure;
pub mod execute;
pub mod frontend;
pub mod review;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{Error, ExecutionError};
use crate::model::{Quote, Route};
use crate::services::{BridgeServices, WalletStatus};

pub use self::configure::{AutoDepositPolicy, ConfigureForm, ConfigureOutcome, ConfigureStep};
pub use self::execute::{ExecuteOutcome, ExecuteStep, Headline, RateChangePolicy, RateDecision};
pub use self::frontend::{BridgeHost, Notice, WizardFrontend};
pub use self::review::{ReviewDecision, ReviewSummary, RouteHop};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardStep {
    Connect,
    Configure,
    Review,
    Execute,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Connect,
        WizardStep::Configure,
        WizardStep::Review,
        WizardStep::Execute,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Connect => "Connect",
            Self::Configure => "Configure",
            Self::Review => "Review",
            Self::Execute => "Execute",
        }
    }

    /// Zero-based position in the step indicator.
    pub fn index(self) -> usize {
        match self {
            Self::Connect => 0,
            Self::Configure => 1,
            Self::Review => 2,
            Self::Execute => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    WalletConnected { address: String },
    WalletDisconnected,
    QuoteReady(Arc<Quote>),
    Back,
    Confirm,
}

/// Current step plus the data the later steps depend on.
#[derive(Debug, Clone)]
pub struct WizardState {
    step: WizardStep,
    address: Option<String>,
    quote: Option<Arc<Quote>>,
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}

impl WizardState {
    pub fn new() -> Self {
        Self {
            step: WizardStep::Connect,
            address: None,
            quote: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn quote(&self) -> Option<&Arc<Quote>> {
        self.quote.as_ref()
    }

    /// Apply an event. Returns whether the state changed; events that don't
    /// apply to the current step are ignored.
    pub fn apply(&mut self, event: WizardEvent) -> bool {
        use WizardStep::*;

        match (self.step, event) {
            (Connect, WizardEvent::WalletConnected { address }) if !address.is_empty() => {
                self.address = Some(address);
                self.step = Configure;
            }
            (Configure | Review | Execute, WizardEvent::WalletDisconnected) => {
                self.address = None;
                self.quote = None;
                self.step = Connect;
            }
            (Configure, WizardEvent::QuoteReady(quote)) => {
                self.quote = Some(quote);
                self.step = Review;
            }
            (Review, WizardEvent::Back) => {
                self.quote = None;
                self.step = Configure;
            }
            (Review, WizardEvent::Confirm) if self.quote.is_some() => {
                self.step = Execute;
            }
            _ => return false,
        }
        tracing::info!(step = self.step.title(), "Wizard step changed");
        true
    }
}

/// How a wizard run ended.
#[derive(Debug)]
pub enum WizardOutcome {
    Completed(Route),
    Failed(ExecutionError),
    /// The user quit or the run was cancelled.
    Abandoned,
}

/// Wait until the wallet reports a connected address.
async fn wait_for_connect(
    wallet: &mut watch::Receiver<WalletStatus>,
    cancel: &CancellationToken,
) -> Option<String> {
    loop {
        let address = wallet
            .borrow_and_update()
            .active_address()
            .map(str::to_string);
        if address.is_some() {
            return address;
        }
        tokio::select! {
            _ = cancel.cancelled() => return None,
            changed = wallet.changed() => {
                if changed.is_err() {
                    return None;
                }
            }
        }
    }
}

/// Resolve once the wallet disconnects. Never resolves if the session is gone.
async fn wait_for_disconnect(wallet: &mut watch::Receiver<WalletStatus>) {
    loop {
        if !wallet.borrow_and_update().connected {
            return;
        }
        if wallet.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Run `fut` unless the wallet disconnects first, in which case the step
/// token is cancelled and the future dropped.
async fn race_disconnect<F: Future>(
    wallet: &mut watch::Receiver<WalletStatus>,
    step_cancel: &CancellationToken,
    fut: F,
) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = wait_for_disconnect(wallet) => {
            step_cancel.cancel();
            None
        }
        output = fut => Some(output),
    }
}

pub struct BridgeWizard {
    session_id: Uuid,
    services: BridgeServices,
    wallet: watch::Receiver<WalletStatus>,
    auto_deposit: AutoDepositPolicy,
    rate_policy: RateChangePolicy,
    cancel: CancellationToken,
    state: WizardState,
    form: ConfigureForm,
}

impl BridgeWizard {
    pub fn new(services: BridgeServices, wallet: watch::Receiver<WalletStatus>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            services,
            wallet,
            auto_deposit: AutoDepositPolicy::default(),
            rate_policy: RateChangePolicy::default(),
            cancel: CancellationToken::new(),
            state: WizardState::new(),
            form: ConfigureForm::default(),
        }
    }

    pub fn with_auto_deposit_policy(mut self, policy: AutoDepositPolicy) -> Self {
        self.auto_deposit = policy;
        self
    }

    pub fn with_rate_change_policy(mut self, policy: RateChangePolicy) -> Self {
        self.rate_policy = policy;
        self
    }

    /// Root token; cancelling it abandons the run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Correlates this run's log lines.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    fn on_disconnect(&mut self) {
        tracing::info!("Wallet disconnected; returning to Connect");
        self.state.apply(WizardEvent::WalletDisconnected);
        self.form = ConfigureForm::default();
    }

    pub async fn run(
        &mut self,
        frontend: &dyn WizardFrontend,
        host: &dyn BridgeHost,
    ) -> Result<WizardOutcome, Error> {
        let span = tracing::info_span!("wizard", session = %self.session_id);
        self.drive(frontend, host).instrument(span).await
    }

    async fn drive(
        &mut self,
        frontend: &dyn WizardFrontend,
        host: &dyn BridgeHost,
    ) -> Result<WizardOutcome, Error> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(WizardOutcome::Abandoned);
            }
            let step = self.state.step();
            frontend.show_step(step).await?;

            match step {
                WizardStep::Connect => {
                    frontend.show_connect().await?;
                    let Some(address) = wait_for_connect(&mut self.wallet, &self.cancel).await
                    else {
                        return Ok(WizardOutcome::Abandoned);
                    };
                    self.state.apply(WizardEvent::WalletConnected { address });
                }
                WizardStep::Configure => {
                    let address = self.state.address().unwrap_or_default().to_string();
                    let step_cancel = self.cancel.child_token();
                    let configure = ConfigureStep::new(
                        &self.services,
                        frontend,
                        &self.auto_deposit,
                        address,
                        step_cancel.clone(),
                    );
                    let outcome = race_disconnect(
                        &mut self.wallet,
                        &step_cancel,
                        configure.run(&mut self.form),
                    )
                    .await;
                    step_cancel.cancel();

                    match outcome {
                        None => self.on_disconnect(),
                        Some(outcome) => match outcome? {
                            ConfigureOutcome::Quoted(quote) => {
                                self.state.apply(WizardEvent::QuoteReady(Arc::new(quote)));
                            }
                            ConfigureOutcome::Abandoned => return Ok(WizardOutcome::Abandoned),
                            ConfigureOutcome::Cancelled => {}
                        },
                    }
                }
                WizardStep::Review => {
                    let Some(quote) = self.state.quote().cloned() else {
                        self.state.apply(WizardEvent::Back);
                        continue;
                    };
                    let summary = ReviewSummary::from_quote(&quote)?;
                    let step_cancel = self.cancel.child_token();
                    let decision =
                        race_disconnect(&mut self.wallet, &step_cancel, frontend.review(&summary))
                            .await;
                    step_cancel.cancel();

                    match decision {
                        None => self.on_disconnect(),
                        Some(decision) => match decision? {
                            ReviewDecision::Back => {
                                self.state.apply(WizardEvent::Back);
                            }
                            ReviewDecision::Confirm => {
                                self.state.apply(WizardEvent::Confirm);
                            }
                        },
                    }
                }
                WizardStep::Execute => {
                    let Some(quote) = self.state.quote().cloned() else {
                        return Ok(WizardOutcome::Abandoned);
                    };
                    let step_cancel = self.cancel.child_token();
                    let (outcome, disconnected) = {
                        let execute = ExecuteStep::new(
                            &self.services,
                            frontend,
                            host,
                            self.rate_policy,
                            step_cancel.clone(),
                        );
                        let run = execute.run(&quote);
                        tokio::pin!(run);

                        // A disconnect cancels the attempt, which still
                        // reports to the host before the step returns.
                        tokio::select! {
                            biased;
                            outcome = &mut run => (outcome, false),
                            _ = wait_for_disconnect(&mut self.wallet) => {
                                step_cancel.cancel();
                                (run.await, true)
                            }
                        }
                    };
                    step_cancel.cancel();

                    match outcome? {
                        ExecuteOutcome::Completed(route) => {
                            return Ok(WizardOutcome::Completed(route));
                        }
                        ExecuteOutcome::Failed(err) => return Ok(WizardOutcome::Failed(err)),
                        ExecuteOutcome::Cancelled if disconnected => self.on_disconnect(),
                        ExecuteOutcome::Cancelled => return Ok(WizardOutcome::Abandoned),
                    }
                }
            }
        }
    }
}
