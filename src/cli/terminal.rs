//! Terminal rendering of the bridge wizard.

use std::io;

use async_trait::async_trait;
use termimad::MadSkin;
use tokio_util::sync::CancellationToken;

use super::prompts;
use crate::error::{Error, ExecutionError, WalletError};
use crate::lifi::TransactionSender;
use crate::model::{ExecutionProgressEvent, Severity, TransactionRequest};
use crate::services::{WalletSession, is_valid_tx_hash, with_cancel};
use crate::wizard::{
    BridgeHost, Headline, Notice, ReviewDecision, ReviewSummary, WizardFrontend, WizardStep,
};

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

async fn blocking<T, F>(f: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| io::Error::other(format!("prompt task failed: {e}")))?
}

fn make_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.set_headers_fg(termimad::crossterm::style::Color::Yellow);
    skin.bold.set_fg(termimad::crossterm::style::Color::White);
    skin.italic
        .set_fg(termimad::crossterm::style::Color::Magenta);
    skin.inline_code
        .set_fg(termimad::crossterm::style::Color::Green);
    skin
}

/// Markdown for the review card. Pipes in values would break the table.
pub fn review_markdown(summary: &ReviewSummary) -> String {
    let mut md = String::from("|:-|-:|\n");
    for (label, value) in summary.lines() {
        md.push_str(&format!("|**{label}**|{}|\n", value.replace('|', "/")));
    }
    md.push_str("|-\n");
    if !summary.hops.is_empty() {
        md.push_str("\n**Route**\n\n");
        for (i, hop) in summary.hops.iter().enumerate() {
            md.push_str(&format!("{}. `{}` *{}*\n", i + 1, hop.tool, hop.kind));
        }
    }
    md
}

fn severity_color(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => GREEN,
        Severity::InProgress => CYAN,
        Severity::Error => RED,
        Severity::Warning => YELLOW,
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Success => "\u{2713}",
        Severity::InProgress => "\u{25CF}",
        Severity::Error => "\u{2717}",
        Severity::Warning => "!",
    }
}

/// One progress row plus its detail lines.
pub fn progress_lines(event: &ExecutionProgressEvent) -> Vec<String> {
    let severity = event.severity();
    let color = severity_color(severity);
    let mut lines = vec![format!(
        "  {color}{}{RESET} {} {DIM}{}{RESET}",
        severity_icon(severity),
        event.label,
        event.status.label()
    )];
    if let Some(message) = &event.message {
        lines.push(format!("      {color}{message}{RESET}"));
    }
    match (&event.tx_link, &event.tx_hash) {
        (Some(link), _) => lines.push(format!("      {DIM}{link}{RESET}")),
        (None, Some(hash)) => lines.push(format!("      {DIM}tx {hash}{RESET}")),
        (None, None) => {}
    }
    lines
}

fn step_indicator(current: WizardStep) -> String {
    WizardStep::ALL
        .iter()
        .map(|step| {
            if *step == current {
                format!("{BOLD}{CYAN}{}. {}{RESET}", step.index() + 1, step.title())
            } else if step.index() < current.index() {
                format!("{GREEN}{}. {}{RESET}", step.index() + 1, step.title())
            } else {
                format!("{DIM}{}. {}{RESET}", step.index() + 1, step.title())
            }
        })
        .collect::<Vec<_>>()
        .join(&format!(" {DIM}\u{203A}{RESET} "))
}

/// Interactive frontend on stdin/stdout.
pub struct TerminalFrontend {
    wallet: WalletSession,
    skin: MadSkin,
}

impl TerminalFrontend {
    pub fn new(wallet: WalletSession) -> Self {
        Self {
            wallet,
            skin: make_skin(),
        }
    }
}

#[async_trait]
impl WizardFrontend for TerminalFrontend {
    async fn show_step(&self, step: WizardStep) -> io::Result<()> {
        println!();
        println!("{}", step_indicator(step));
        println!();
        Ok(())
    }

    async fn show_connect(&self) -> io::Result<()> {
        if let Some(address) = self.wallet.status().active_address() {
            prompts::print_success(&format!("Wallet connected: {address}"));
            return Ok(());
        }
        prompts::print_info("Connect your wallet to bridge assets to HyperEVM.");
        let wallet = self.wallet.clone();
        blocking(move || loop {
            let address = prompts::input("Wallet address (0x...)")?;
            match wallet.connect(&address) {
                Ok(()) => {
                    prompts::print_success("Wallet connected");
                    return Ok(());
                }
                Err(e) => prompts::print_error(&e.to_string()),
            }
        })
        .await
    }

    async fn notify(&self, notice: Notice, message: &str) -> io::Result<()> {
        match notice {
            Notice::Info => prompts::print_info(message),
            Notice::Success => prompts::print_success(message),
            Notice::Warning => prompts::print_warning(message),
            Notice::Error => prompts::print_error(message),
        }
        Ok(())
    }

    async fn select(&self, prompt: &str, options: &[String]) -> io::Result<usize> {
        let prompt = prompt.to_string();
        let options = options.to_vec();
        blocking(move || prompts::select_one(&prompt, &options)).await
    }

    async fn input(&self, prompt: &str) -> io::Result<String> {
        let prompt = prompt.to_string();
        blocking(move || prompts::input(&prompt)).await
    }

    async fn confirm(&self, prompt: &str, default: bool) -> io::Result<bool> {
        let prompt = prompt.to_string();
        blocking(move || prompts::confirm(&prompt, default)).await
    }

    async fn review(&self, summary: &ReviewSummary) -> io::Result<ReviewDecision> {
        self.skin.print_text(&review_markdown(summary));
        println!();
        let options = vec!["Confirm Bridge".to_string(), "Back".to_string()];
        let choice = blocking(move || prompts::select_one("Review your bridge:", &options)).await?;
        Ok(if choice == 0 {
            ReviewDecision::Confirm
        } else {
            ReviewDecision::Back
        })
    }

    async fn show_progress(
        &self,
        headline: Headline,
        events: &[ExecutionProgressEvent],
        error: Option<&str>,
    ) -> io::Result<()> {
        let color = match headline {
            Headline::Executing => CYAN,
            Headline::Failed => RED,
            Headline::Complete => GREEN,
        };
        println!();
        println!("{BOLD}{color}{}{RESET}", headline.title());
        println!("{DIM}{}{RESET}", headline.subtitle());
        for event in events {
            for line in progress_lines(event) {
                println!("{line}");
            }
        }
        if let Some(error) = error {
            println!("  {RED}{error}{RESET}");
        }
        Ok(())
    }
}

/// Reports terminal outcomes to the log.
#[derive(Debug, Default)]
pub struct TerminalHost;

impl BridgeHost for TerminalHost {
    fn on_success(&self) {
        tracing::info!("Bridge succeeded");
    }

    fn on_error(&self, error: &ExecutionError) {
        let payload = Error::from(error.clone()).to_error_payload();
        tracing::warn!(payload = %payload.to_log_line(), "Bridge attempt failed");
    }
}

/// Prints each transaction for signing in an external wallet and reads
/// back the hash it was broadcast under.
#[derive(Debug, Default)]
pub struct ManualTransactionSender;

fn describe_transaction(request: &TransactionRequest) -> String {
    let mut md = String::from("|:-|:-|\n");
    md.push_str(&format!("|**To**|`{}`|\n", request.to));
    if let Some(chain_id) = request.chain_id {
        md.push_str(&format!("|**Chain**|{chain_id}|\n"));
    }
    if let Some(from) = &request.from {
        md.push_str(&format!("|**From**|`{from}`|\n"));
    }
    if let Some(value) = &request.value {
        md.push_str(&format!("|**Value**|{value}|\n"));
    }
    if let Some(gas_limit) = &request.gas_limit {
        md.push_str(&format!("|**Gas limit**|{gas_limit}|\n"));
    }
    md.push_str("|-\n");
    md
}

#[async_trait]
impl TransactionSender for ManualTransactionSender {
    async fn send_transaction(
        &self,
        request: &TransactionRequest,
        cancel: &CancellationToken,
    ) -> Result<String, WalletError> {
        println!();
        println!("{BOLD}{YELLOW}Sign this transaction in your wallet{RESET}");
        make_skin().print_text(&describe_transaction(request));
        println!("{DIM}data:{RESET} {}", request.data);

        let prompt = blocking(|| loop {
            let Some(hash) =
                prompts::optional_input("Transaction hash", Some("empty to reject"))?
            else {
                return Ok(None);
            };
            if is_valid_tx_hash(&hash) {
                return Ok(Some(hash));
            }
            prompts::print_error("Expected 0x followed by 64 hex characters");
        });

        match with_cancel(cancel, prompt).await {
            Some(Ok(Some(hash))) => Ok(hash),
            Some(Ok(None)) => Err(WalletError::Rejected {
                reason: "rejected by user".to_string(),
            }),
            Some(Err(e)) => Err(WalletError::Rejected {
                reason: e.to_string(),
            }),
            None => Err(WalletError::Rejected {
                reason: "cancelled".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProcessStatus;
    use rust_decimal_macros::dec;

    fn summary() -> ReviewSummary {
        ReviewSummary {
            from_symbol: "USDC".into(),
            to_symbol: "USDC".into(),
            send_amount: "10.0000".into(),
            receive_amount: "9.9500".into(),
            min_receive_amount: "9.9003".into(),
            gas_cost_usd: dec!(1.2),
            fee_cost_usd: None,
            duration_minutes: 2,
            hops: Vec::new(),
        }
    }

    #[test]
    fn review_table_lists_every_row() {
        let md = review_markdown(&summary());
        assert!(md.contains("|**You send**|10.0000 USDC|"));
        assert!(md.contains("|**Gas Cost**|$1.20|"));
        assert!(md.contains("|**Minimum Received**|9.9003 USDC|"));
        assert!(!md.contains("Bridge Fees"));
        assert!(!md.contains("**Route**"));
    }

    #[test]
    fn progress_rows_show_message_and_link() {
        let event = ExecutionProgressEvent {
            label: "Bridge transaction".into(),
            status: ProcessStatus::Failed,
            tx_hash: Some("0xabc".into()),
            tx_link: Some("https://arbiscan.io/tx/0xabc".into()),
            message: Some("Execution reverted".into()),
        };
        let lines = progress_lines(&event);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(RED));
        assert!(lines[1].contains("Execution reverted"));
        assert!(lines[2].contains("https://arbiscan.io/tx/0xabc"));
    }

    #[test]
    fn indicator_highlights_current_step() {
        let line = step_indicator(WizardStep::Review);
        assert!(line.contains(&format!("{BOLD}{CYAN}3. Review")));
        assert!(line.contains(&format!("{GREEN}1. Connect")));
        assert!(line.contains(&format!("{DIM}4. Execute")));
    }
}
