//! End-to-end runs of the bridge wizard against in-memory collaborators.
//!
//! A scripted frontend answers every prompt from a queue and records what the
//! wizard rendered, so each test reads as the user journey it covers:
//! - happy path from Connect to a completed bridge
//! - quote failure followed by a successful retry
//! - execution failure followed by a full re-run
//! - wallet disconnect while configuring, reviewing or executing
//! - small vs large exchange rate changes during execution

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use slyck::error::{DirectoryError, ExecutionError, QuoteError};
use slyck::model::{
    ChainDescriptor, ChainType, CostEntry, ExecutionProgressEvent, ProcessKind, ProcessStatus,
    Quote, QuoteAction, QuoteEstimate, QuoteRequest, Route, StepExecution, TokenDescriptor,
    ToolDetails,
};
use slyck::services::{
    BridgeServices, ChainDirectory, ExecutionService, ExecutionUpdate, QuoteService,
    TokenDirectory, WalletSession, negotiate_rate_change,
};
use slyck::wizard::{
    BridgeHost, BridgeWizard, Headline, Notice, ReviewDecision, ReviewSummary, WizardFrontend,
    WizardOutcome, WizardStep,
};

const ADDRESS: &str = "0x0123456789abcdef0123456789abcdef01234567";
const ARB_USDC: &str = "0xaf88d065e77c8cC2239327C5EDb3A432268e5831";
const HYPER_USDC: &str = "0xb88339CB7199b77E23DB6E890353E22632Ba630f";
const HYPE: &str = "0x0000000000000000000000000000000000000000";
const LOGO: &str = "https://static.example/logo.png";
const TIMEOUT: Duration = Duration::from_secs(10);

// ── Scripted frontend ──────────────────────────────────────

#[derive(Debug)]
enum Action {
    /// Pick the first option starting with this text.
    Select(&'static str),
    Input(&'static str),
    Confirm(bool),
    Review(ReviewDecision),
    /// Disconnect the wallet and never answer the pending prompt.
    Disconnect,
    /// Connect the wallet when the Connect view is shown.
    Connect(&'static str),
}

#[derive(Debug, Default)]
struct Recorded {
    steps: Vec<WizardStep>,
    notices: Vec<(Notice, String)>,
    menus: Vec<Vec<String>>,
    confirms: Vec<String>,
    reviews: Vec<ReviewSummary>,
    headlines: Vec<Headline>,
    last_events: Vec<ExecutionProgressEvent>,
    last_error: Option<String>,
}

struct ScriptedFrontend {
    wallet: WalletSession,
    script: Mutex<VecDeque<Action>>,
    recorded: Mutex<Recorded>,
}

impl ScriptedFrontend {
    fn new(wallet: WalletSession, script: Vec<Action>) -> Self {
        Self {
            wallet,
            script: Mutex::new(script.into()),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    fn next(&self, expecting: &str) -> io::Result<Action> {
        self.script.lock().unwrap().pop_front().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("script exhausted while expecting {expecting}"),
            )
        })
    }

    fn unexpected(action: Action, expecting: &str) -> io::Error {
        io::Error::other(format!("expected {expecting}, script had {action:?}"))
    }

    async fn disconnect_and_hang<T>(&self) -> io::Result<T> {
        self.wallet.disconnect();
        std::future::pending().await
    }

    fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl WizardFrontend for ScriptedFrontend {
    async fn show_step(&self, step: WizardStep) -> io::Result<()> {
        self.recorded.lock().unwrap().steps.push(step);
        Ok(())
    }

    async fn show_connect(&self) -> io::Result<()> {
        if self.wallet.status().connected {
            return Ok(());
        }
        match self.next("Connect")? {
            Action::Connect(address) => {
                self.wallet.connect(address).map_err(io::Error::other)?;
                Ok(())
            }
            other => Err(Self::unexpected(other, "Connect")),
        }
    }

    async fn notify(&self, notice: Notice, message: &str) -> io::Result<()> {
        self.recorded
            .lock()
            .unwrap()
            .notices
            .push((notice, message.to_string()));
        Ok(())
    }

    async fn select(&self, _prompt: &str, options: &[String]) -> io::Result<usize> {
        self.recorded.lock().unwrap().menus.push(options.to_vec());
        match self.next("Select")? {
            Action::Select(prefix) => options
                .iter()
                .position(|o| o.starts_with(prefix))
                .ok_or_else(|| io::Error::other(format!("no option '{prefix}' in {options:?}"))),
            Action::Disconnect => self.disconnect_and_hang().await,
            other => Err(Self::unexpected(other, "Select")),
        }
    }

    async fn input(&self, _prompt: &str) -> io::Result<String> {
        match self.next("Input")? {
            Action::Input(value) => Ok(value.to_string()),
            Action::Disconnect => self.disconnect_and_hang().await,
            other => Err(Self::unexpected(other, "Input")),
        }
    }

    async fn confirm(&self, prompt: &str, _default: bool) -> io::Result<bool> {
        self.recorded
            .lock()
            .unwrap()
            .confirms
            .push(prompt.to_string());
        match self.next("Confirm")? {
            Action::Confirm(answer) => Ok(answer),
            Action::Disconnect => self.disconnect_and_hang().await,
            other => Err(Self::unexpected(other, "Confirm")),
        }
    }

    async fn review(&self, summary: &ReviewSummary) -> io::Result<ReviewDecision> {
        self.recorded.lock().unwrap().reviews.push(summary.clone());
        match self.next("Review")? {
            Action::Review(decision) => Ok(decision),
            Action::Disconnect => self.disconnect_and_hang().await,
            other => Err(Self::unexpected(other, "Review")),
        }
    }

    async fn show_progress(
        &self,
        headline: Headline,
        events: &[ExecutionProgressEvent],
        error: Option<&str>,
    ) -> io::Result<()> {
        let mut recorded = self.recorded.lock().unwrap();
        if recorded.headlines.last() != Some(&headline) {
            recorded.headlines.push(headline);
        }
        recorded.last_events = events.to_vec();
        recorded.last_error = error.map(str::to_string);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingHost {
    successes: Mutex<u32>,
    errors: Mutex<Vec<String>>,
}

impl BridgeHost for RecordingHost {
    fn on_success(&self) {
        *self.successes.lock().unwrap() += 1;
    }

    fn on_error(&self, error: &ExecutionError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}

// ── In-memory collaborators ────────────────────────────────

struct FakeDirectory;

#[async_trait]
impl ChainDirectory for FakeDirectory {
    async fn list_chains(
        &self,
        _chain_types: &[ChainType],
        _cancel: &CancellationToken,
    ) -> Result<Vec<ChainDescriptor>, DirectoryError> {
        let mut testnet = ChainDescriptor::new(421614, "Arbitrum Sepolia", ChainType::Evm);
        testnet.mainnet = false;
        Ok(vec![
            ChainDescriptor::new(42161, "Arbitrum", ChainType::Evm),
            testnet,
        ])
    }
}

#[async_trait]
impl TokenDirectory for FakeDirectory {
    async fn list_tokens(
        &self,
        chain_id: u64,
        _cancel: &CancellationToken,
    ) -> Result<Vec<TokenDescriptor>, DirectoryError> {
        Ok(match chain_id {
            42161 => vec![
                TokenDescriptor::new(42161, ARB_USDC, "USDC", 6).with_logo(LOGO),
                TokenDescriptor::new(42161, "0x00000000000000000000000000000000000000da", "DAI", 18)
                    .with_logo(LOGO),
                TokenDescriptor::new(42161, "0x00000000000000000000000000000000000000ff", "SPAM", 18),
            ],
            999 => vec![
                TokenDescriptor::new(999, HYPER_USDC, "USDC", 6).with_logo(LOGO),
                TokenDescriptor::new(999, HYPE, "HYPE", 18).with_logo(LOGO),
            ],
            _ => Vec::new(),
        })
    }

    async fn list_balances(
        &self,
        _address: &str,
        tokens: Vec<TokenDescriptor>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<TokenDescriptor>, DirectoryError> {
        Ok(tokens
            .into_iter()
            .map(|t| {
                let balance = if t.symbol == "USDC" { 50_000_000 } else { 0 };
                t.with_balance(balance)
            })
            .collect())
    }
}

fn build_quote(request: &QuoteRequest) -> Quote {
    Quote::new(
        "quote-1",
        ToolDetails {
            key: "across".into(),
            name: "Across".into(),
            logo_url: None,
        },
        QuoteAction {
            from_chain_id: request.from_chain_id,
            to_chain_id: request.to_chain_id,
            from_token: TokenDescriptor::new(request.from_chain_id, ARB_USDC, "USDC", 6),
            to_token: TokenDescriptor::new(999, HYPER_USDC, "USDC", 6),
            from_amount: request.from_amount_raw.clone(),
            slippage: Some(0.005),
            from_address: Some(request.from_address.clone()),
            to_address: Some(request.from_address.clone()),
        },
    )
    .with_estimate(QuoteEstimate {
        to_amount: "9950000".into(),
        to_amount_min: "9900250".into(),
        execution_duration: 60.0,
        gas_costs: vec![CostEntry::usd("1.20")],
        ..QuoteEstimate::default()
    })
}

#[derive(Default)]
struct FakeQuotes {
    failures: Mutex<VecDeque<QuoteError>>,
    requests: Mutex<Vec<QuoteRequest>>,
}

#[async_trait]
impl QuoteService for FakeQuotes {
    async fn get_quote(
        &self,
        request: &QuoteRequest,
        _cancel: &CancellationToken,
    ) -> Result<Quote, QuoteError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        Ok(build_quote(request))
    }
}

#[derive(Debug)]
enum Attempt {
    Succeed,
    Fail(&'static str),
    RateChange(&'static str),
}

#[derive(Default)]
struct FakeExecution {
    attempts: Mutex<VecDeque<Attempt>>,
    calls: Mutex<u32>,
}

impl FakeExecution {
    fn with(attempts: Vec<Attempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

fn step_execution(route: &mut Route) -> &mut StepExecution {
    route.steps[0]
        .execution
        .get_or_insert_with(StepExecution::default)
}

async fn settle(
    mut route: Route,
    updates: &mpsc::Sender<ExecutionUpdate>,
) -> Result<Route, ExecutionError> {
    let execution = step_execution(&mut route);
    let process = execution.process_mut(ProcessKind::CrossChain);
    process.set_status(ProcessStatus::Pending);
    process.tx_hash = Some(format!("0x{}", "ab".repeat(32)));
    let _ = updates.send(ExecutionUpdate::Progress(route.clone())).await;

    let execution = step_execution(&mut route);
    execution
        .process_mut(ProcessKind::CrossChain)
        .set_status(ProcessStatus::Done);
    execution
        .process_mut(ProcessKind::ReceivingChain)
        .set_status(ProcessStatus::Done);
    execution.status = ProcessStatus::Done;
    let _ = updates.send(ExecutionUpdate::Progress(route.clone())).await;
    Ok(route)
}

#[async_trait]
impl ExecutionService for FakeExecution {
    async fn execute(
        &self,
        mut route: Route,
        updates: mpsc::Sender<ExecutionUpdate>,
        cancel: CancellationToken,
    ) -> Result<Route, ExecutionError> {
        *self.calls.lock().unwrap() += 1;
        let attempt = self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Attempt::Succeed);

        match attempt {
            Attempt::Succeed => settle(route, &updates).await,
            Attempt::Fail(reason) => {
                let execution = step_execution(&mut route);
                execution.process_mut(ProcessKind::CrossChain);
                execution.fail_current(ProcessStatus::Failed, reason);
                let _ = updates.send(ExecutionUpdate::Progress(route.clone())).await;
                Err(ExecutionError::StepFailed {
                    step: "quote-1".into(),
                    reason: reason.into(),
                })
            }
            Attempt::RateChange(new_to_amount) => {
                let token = route.steps[0].step.action.to_token.clone();
                let old = route.to_amount.clone();
                if negotiate_rate_change(&updates, token.clone(), &old, new_to_amount, &cancel)
                    .await?
                {
                    route.to_amount = new_to_amount.to_string();
                    settle(route, &updates).await
                } else {
                    Err(ExecutionError::RateChangeRejected {
                        symbol: token.symbol,
                        new_amount: new_to_amount.to_string(),
                    })
                }
            }
        }
    }
}

struct Harness {
    wizard: BridgeWizard,
    frontend: ScriptedFrontend,
    host: RecordingHost,
    quotes: Arc<FakeQuotes>,
    execution: Arc<FakeExecution>,
}

impl Harness {
    fn new(script: Vec<Action>, quotes: FakeQuotes, execution: FakeExecution) -> Self {
        let directory = Arc::new(FakeDirectory);
        let quotes = Arc::new(quotes);
        let execution = Arc::new(execution);
        let services = BridgeServices {
            chains: directory.clone(),
            tokens: directory,
            quotes: quotes.clone(),
            execution: execution.clone(),
        };
        let wallet = WalletSession::new();
        wallet.connect(ADDRESS).unwrap();
        Self {
            wizard: BridgeWizard::new(services, wallet.subscribe()),
            frontend: ScriptedFrontend::new(wallet, script),
            host: RecordingHost::default(),
            quotes,
            execution,
        }
    }

    async fn run(&mut self) -> WizardOutcome {
        tokio::time::timeout(TIMEOUT, self.wizard.run(&self.frontend, &self.host))
            .await
            .expect("wizard timed out")
            .expect("wizard failed")
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.frontend.recorded.lock().unwrap()
    }
}

/// Fill the form with 10 USDC from Arbitrum to USDC on HyperEVM.
fn fill_form() -> Vec<Action> {
    vec![
        Action::Select("From chain"),
        Action::Select("Arbitrum"),
        Action::Select("Token"),
        Action::Select("USDC"),
        Action::Select("Amount"),
        Action::Input("10"),
        Action::Select("To HyperEVM"),
        Action::Select("USDC"),
    ]
}

fn script(parts: Vec<Vec<Action>>) -> Vec<Action> {
    parts.into_iter().flatten().collect()
}

// ── Scenarios ──────────────────────────────────────────────

#[tokio::test]
async fn full_bridge_flow_completes() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
            ],
        ]),
        FakeQuotes::default(),
        FakeExecution::default(),
    );

    let route = match harness.run().await {
        WizardOutcome::Completed(route) => route,
        other => panic!("expected completion, got {other:?}"),
    };
    assert!(route.is_done());
    assert_eq!(harness.frontend.remaining(), 0);

    let requests = harness.quotes.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].from_chain_id, 42161);
    assert_eq!(requests[0].from_amount_raw, "10000000");
    assert_eq!(requests[0].to_chain_id, 999);
    assert_eq!(requests[0].to_token_address, HYPER_USDC);

    let recorded = harness.recorded();
    assert_eq!(
        recorded.steps,
        vec![
            WizardStep::Connect,
            WizardStep::Configure,
            WizardStep::Review,
            WizardStep::Execute,
        ]
    );

    // Testnets, logo-less and zero-balance tokens never reach the user.
    assert!(recorded.menus.iter().any(|m| m == &vec!["Arbitrum".to_string()]));
    assert!(recorded.menus.iter().any(|m| m == &vec!["USDC (50.0000)".to_string()]));

    // USDC is eligible for auto-deposit, so the toggle was offered.
    let last_menu = recorded.menus.last().unwrap();
    assert!(last_menu.iter().any(|o| o.contains("Auto-deposit")));

    let review = &recorded.reviews[0];
    assert_eq!(review.send_amount, "10.0000");
    assert_eq!(review.receive_amount, "9.9500");
    assert_eq!(review.gas_cost_display(), "$1.20");
    assert_eq!(review.fee_cost_usd, None);

    assert_eq!(recorded.headlines, vec![Headline::Executing, Headline::Complete]);
    assert!(
        recorded
            .last_events
            .iter()
            .all(|e| e.status == ProcessStatus::Done)
    );
    drop(recorded);
    assert_eq!(*harness.host.successes.lock().unwrap(), 1);
    assert!(harness.host.errors.lock().unwrap().is_empty());
}

#[tokio::test]
async fn incomplete_form_is_not_submitted() {
    let mut harness = Harness::new(
        vec![Action::Select("Get quote"), Action::Select("Quit")],
        FakeQuotes::default(),
        FakeExecution::default(),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Abandoned));
    assert!(harness.quotes.requests.lock().unwrap().is_empty());
    assert!(
        harness
            .recorded()
            .notices
            .iter()
            .any(|(notice, msg)| *notice == Notice::Warning && msg == "Please fill in all fields")
    );
}

#[tokio::test]
async fn quote_failure_can_be_retried() {
    let quotes = FakeQuotes::default();
    quotes.failures.lock().unwrap().push_back(QuoteError::NoRoute {
        message: "No available quotes for the requested transfer".into(),
    });
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
            ],
        ]),
        quotes,
        FakeExecution::default(),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Completed(_)));
    assert_eq!(harness.quotes.requests.lock().unwrap().len(), 2);
    assert!(
        harness
            .recorded()
            .notices
            .iter()
            .any(|(notice, msg)| *notice == Notice::Error
                && msg.starts_with("Failed to get quote. Please try again."))
    );
}

#[tokio::test]
async fn back_from_review_keeps_the_form() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Back),
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
            ],
        ]),
        FakeQuotes::default(),
        FakeExecution::default(),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Completed(_)));
    assert_eq!(harness.quotes.requests.lock().unwrap().len(), 2);
    assert_eq!(
        harness.recorded().steps,
        vec![
            WizardStep::Connect,
            WizardStep::Configure,
            WizardStep::Review,
            WizardStep::Configure,
            WizardStep::Review,
            WizardStep::Execute,
        ]
    );
}

#[tokio::test]
async fn execution_failure_reruns_the_route() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
                Action::Confirm(true),
            ],
        ]),
        FakeQuotes::default(),
        FakeExecution::with(vec![Attempt::Fail("Execution reverted"), Attempt::Succeed]),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Completed(_)));
    assert_eq!(harness.execution.calls(), 2);

    let recorded = harness.recorded();
    assert_eq!(recorded.confirms, vec!["Try again?".to_string()]);
    assert_eq!(
        recorded.headlines,
        vec![
            Headline::Executing,
            Headline::Failed,
            Headline::Executing,
            Headline::Complete,
        ]
    );
    drop(recorded);
    assert_eq!(harness.host.errors.lock().unwrap().len(), 1);
    assert_eq!(*harness.host.successes.lock().unwrap(), 1);
}

#[tokio::test]
async fn declined_retry_reports_failure() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
                Action::Confirm(false),
            ],
        ]),
        FakeQuotes::default(),
        FakeExecution::with(vec![Attempt::Fail("Execution reverted")]),
    );

    let outcome = harness.run().await;
    assert!(matches!(
        outcome,
        WizardOutcome::Failed(ExecutionError::StepFailed { .. })
    ));
    let recorded = harness.recorded();
    let failed = recorded
        .last_events
        .iter()
        .find(|e| e.status == ProcessStatus::Failed)
        .expect("failed row");
    assert_eq!(failed.message.as_deref(), Some("Execution reverted"));
    assert!(recorded.last_error.as_deref().unwrap().contains("Execution reverted"));
}

#[tokio::test]
async fn disconnect_while_configuring_resets_to_connect() {
    let mut harness = Harness::new(
        vec![
            Action::Select("From chain"),
            Action::Select("Arbitrum"),
            Action::Disconnect,
            Action::Connect(ADDRESS),
            Action::Select("Quit"),
        ],
        FakeQuotes::default(),
        FakeExecution::default(),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Abandoned));

    let recorded = harness.recorded();
    assert_eq!(
        recorded.steps,
        vec![
            WizardStep::Connect,
            WizardStep::Configure,
            WizardStep::Connect,
            WizardStep::Configure,
        ]
    );
    // The form starts over after reconnecting.
    let last_menu = recorded.menus.last().unwrap();
    assert!(last_menu.contains(&"From chain: Select chain".to_string()));
}

#[tokio::test]
async fn disconnect_at_review_resets_to_connect() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Disconnect,
                Action::Connect(ADDRESS),
                Action::Select("Quit"),
            ],
        ]),
        FakeQuotes::default(),
        FakeExecution::default(),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Abandoned));
    assert_eq!(harness.frontend.remaining(), 0);
    assert_eq!(harness.execution.calls(), 0);

    let recorded = harness.recorded();
    assert_eq!(
        recorded.steps,
        vec![
            WizardStep::Connect,
            WizardStep::Configure,
            WizardStep::Review,
            WizardStep::Connect,
            WizardStep::Configure,
        ]
    );
    let last_menu = recorded.menus.last().unwrap();
    assert!(last_menu.contains(&"From chain: Select chain".to_string()));
    drop(recorded);
    assert!(harness.host.errors.lock().unwrap().is_empty());
    assert_eq!(*harness.host.successes.lock().unwrap(), 0);
}

#[tokio::test]
async fn disconnect_during_rate_prompt_cancels_execution() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
                Action::Disconnect,
                Action::Connect(ADDRESS),
                Action::Select("Quit"),
            ],
        ]),
        FakeQuotes::default(),
        FakeExecution::with(vec![Attempt::RateChange("9651500")]),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Abandoned));
    assert_eq!(harness.frontend.remaining(), 0);
    assert_eq!(harness.execution.calls(), 1);

    assert_eq!(
        harness.recorded().steps,
        vec![
            WizardStep::Connect,
            WizardStep::Configure,
            WizardStep::Review,
            WizardStep::Execute,
            WizardStep::Connect,
            WizardStep::Configure,
        ]
    );
    assert_eq!(
        harness.host.errors.lock().unwrap().clone(),
        vec![ExecutionError::Cancelled.to_string()]
    );
    assert_eq!(*harness.host.successes.lock().unwrap(), 0);
}

#[tokio::test]
async fn disconnect_at_retry_prompt_returns_to_connect() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
                Action::Disconnect,
                Action::Connect(ADDRESS),
                Action::Select("Quit"),
            ],
        ]),
        FakeQuotes::default(),
        FakeExecution::with(vec![Attempt::Fail("Execution reverted")]),
    );

    let outcome = harness.run().await;
    assert!(matches!(outcome, WizardOutcome::Abandoned));
    assert_eq!(harness.frontend.remaining(), 0);
    assert_eq!(harness.execution.calls(), 1);

    let recorded = harness.recorded();
    assert_eq!(recorded.confirms, vec!["Try again?".to_string()]);
    assert_eq!(
        recorded.steps,
        vec![
            WizardStep::Connect,
            WizardStep::Configure,
            WizardStep::Review,
            WizardStep::Execute,
            WizardStep::Connect,
            WizardStep::Configure,
        ]
    );
    drop(recorded);
    // The failed attempt reported once; the abandoned prompt adds nothing.
    assert_eq!(
        harness.host.errors.lock().unwrap().clone(),
        vec!["Step quote-1 failed: Execution reverted".to_string()]
    );
}

#[tokio::test]
async fn small_rate_change_is_accepted_silently() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
            ],
        ]),
        FakeQuotes::default(),
        // 9.95 -> 9.99975 USDC, +0.5%.
        FakeExecution::with(vec![Attempt::RateChange("9999750")]),
    );

    let route = match harness.run().await {
        WizardOutcome::Completed(route) => route,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(route.to_amount, "9999750");
    assert!(harness.recorded().confirms.is_empty());
}

#[tokio::test]
async fn large_rate_change_needs_consent() {
    let mut harness = Harness::new(
        script(vec![
            fill_form(),
            vec![
                Action::Select("Get quote"),
                Action::Review(ReviewDecision::Confirm),
                Action::Confirm(false),
                Action::Confirm(false),
            ],
        ]),
        FakeQuotes::default(),
        // 9.95 -> 9.6515 USDC, -3%.
        FakeExecution::with(vec![Attempt::RateChange("9651500")]),
    );

    let outcome = harness.run().await;
    assert!(matches!(
        outcome,
        WizardOutcome::Failed(ExecutionError::RateChangeRejected { .. })
    ));
    assert_eq!(
        harness.recorded().confirms,
        vec![
            "Exchange rate changed. New amount: 9.6515 USDC. Continue?".to_string(),
            "Try again?".to_string(),
        ]
    );
    assert_eq!(harness.host.errors.lock().unwrap().len(), 1);
}
