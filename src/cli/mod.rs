//! Command-line surface of the `slyck` binary.

mod config;
mod doctor;
pub mod prompts;
pub mod terminal;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

pub use self::config::ConfigCommand;
pub use self::doctor::run_doctor_command;
use self::terminal::{ManualTransactionSender, TerminalFrontend, TerminalHost, review_markdown};
use crate::amount;
use crate::config::Config;
use crate::lifi::bridge_services;
use crate::model::{DESTINATION_CHAIN_ID, DESTINATION_CHAIN_NAME, TokenDescriptor};
use crate::services::{BridgeServices, WalletSession};
use crate::wizard::configure::{load_chains, load_destination_tokens};
use crate::wizard::{
    AutoDepositPolicy, BridgeWizard, ConfigureForm, ReviewSummary, WizardOutcome,
};

#[derive(Parser, Debug)]
#[command(
    name = "slyck",
    version,
    about = "Bridge assets from any supported chain to HyperEVM"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a config.toml that replaces ~/.slyck/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose logging (slyck=debug).
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the interactive bridge wizard.
    Bridge {
        /// Wallet address to connect with.
        #[arg(long)]
        address: Option<String>,
    },

    /// List supported source chains.
    Chains,

    /// List tokens on a chain, with balances when an address is given.
    Tokens {
        chain_id: u64,

        #[arg(long)]
        address: Option<String>,
    },

    /// Print a review summary for a route without executing it.
    Quote {
        #[arg(long)]
        from_chain: u64,

        /// Token address or symbol on the source chain.
        #[arg(long)]
        from_token: String,

        /// Amount in display units, e.g. 10.5.
        #[arg(long)]
        amount: String,

        /// Token address or symbol on HyperEVM.
        #[arg(long, default_value = "USDC")]
        to_token: String,

        #[arg(long)]
        address: Option<String>,
    },

    /// Manage settings.
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Probe configuration, LI.FI and the HyperEVM RPC.
    Doctor {
        /// Exit non-zero when any check fails.
        #[arg(long)]
        strict: bool,
    },
}

impl Cli {
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let config_path = self.config.as_deref();
        match self.command {
            Command::Bridge { address } => run_bridge(config_path, address, shutdown).await,
            Command::Chains => run_chains(config_path, shutdown).await,
            Command::Tokens { chain_id, address } => {
                run_tokens(config_path, chain_id, address, shutdown).await
            }
            Command::Quote {
                from_chain,
                from_token,
                amount,
                to_token,
                address,
            } => {
                let args = QuoteArgs {
                    from_chain,
                    from_token,
                    amount,
                    to_token,
                };
                run_quote(config_path, args, address, shutdown).await
            }
            Command::Config(command) => config::run_config_command(command, config_path).await,
            Command::Doctor { strict } => run_doctor_command(config_path, strict).await,
        }
    }
}

fn load_services(config_path: Option<&Path>) -> anyhow::Result<(Config, BridgeServices)> {
    let config = Config::load(config_path).context("failed to load configuration")?;
    let services = bridge_services(&config, Arc::new(ManualTransactionSender))?;
    Ok((config, services))
}

fn resolve_address(explicit: Option<String>, config: &Config) -> Option<String> {
    explicit.or_else(|| config.wallet.address.clone())
}

async fn run_bridge(
    config_path: Option<&Path>,
    address: Option<String>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let (config, services) = load_services(config_path)?;

    let wallet = WalletSession::new();
    if let Some(address) = resolve_address(address, &config) {
        wallet.connect(&address)?;
    }

    let mut wizard = BridgeWizard::new(services, wallet.subscribe())
        .with_auto_deposit_policy(AutoDepositPolicy::new(&config.bridge.auto_deposit_symbols));
    tracing::debug!(session = %wizard.session_id(), "Starting bridge wizard");
    let cancel = wizard.cancel_token();
    let forward = tokio::spawn(async move {
        shutdown.cancelled().await;
        cancel.cancel();
    });

    let frontend = TerminalFrontend::new(wallet);
    let result = wizard.run(&frontend, &TerminalHost).await;
    forward.abort();
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(crate::Error::Io(e)) if e.kind() == std::io::ErrorKind::Interrupted => {
            WizardOutcome::Abandoned
        }
        Err(e) => {
            tracing::error!(payload = %e.to_error_payload().to_log_line(), "Wizard stopped");
            return Err(e.into());
        }
    };

    match outcome {
        WizardOutcome::Completed(route) => {
            println!();
            println!("Bridge complete. Route {}", route.id);
            Ok(())
        }
        WizardOutcome::Failed(err) => anyhow::bail!("bridge failed: {err}"),
        WizardOutcome::Abandoned => {
            println!("Bridge cancelled.");
            Ok(())
        }
    }
}

async fn run_chains(config_path: Option<&Path>, cancel: CancellationToken) -> anyhow::Result<()> {
    let (_, services) = load_services(config_path)?;
    let mut chains = load_chains(&services, &cancel).await?;
    chains.sort_by(|a, b| a.name.cmp(&b.name));

    println!("{:<10} {:<24} {:<6} KEY", "ID", "NAME", "TYPE");
    for chain in chains {
        println!(
            "{:<10} {:<24} {:<6} {}",
            chain.id,
            chain.name,
            chain.chain_type.as_str(),
            chain.key
        );
    }
    Ok(())
}

async fn run_tokens(
    config_path: Option<&Path>,
    chain_id: u64,
    address: Option<String>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let (config, services) = load_services(config_path)?;
    let mut tokens = services.tokens.list_tokens(chain_id, &cancel).await?;

    let with_balances = match resolve_address(address, &config) {
        Some(address) => {
            match services
                .tokens
                .list_balances(&address, tokens.clone(), &cancel)
                .await
            {
                Ok(balanced) => {
                    tokens = balanced;
                    true
                }
                Err(e) => {
                    tracing::warn!("Balances unavailable: {}", e);
                    false
                }
            }
        }
        None => false,
    };
    if with_balances {
        tokens.retain(|t| t.balance.is_some_and(|b| b > 0));
    }

    let balance_header = if with_balances { "BALANCE" } else { "" };
    println!(
        "{:<10} {:<44} {:>8} {balance_header}",
        "SYMBOL", "ADDRESS", "DECIMALS"
    );
    for token in &tokens {
        let balance = token
            .balance
            .filter(|_| with_balances)
            .map(|b| amount::format_fixed(b, token.decimals, 4))
            .unwrap_or_default();
        println!(
            "{:<10} {:<44} {:>8} {}",
            token.symbol, token.address, token.decimals, balance
        );
    }
    if tokens.is_empty() {
        println!("No tokens found on chain {chain_id}.");
    }
    Ok(())
}

struct QuoteArgs {
    from_chain: u64,
    from_token: String,
    amount: String,
    to_token: String,
}

/// Match by address first, then by symbol.
fn find_token<'t>(tokens: &'t [TokenDescriptor], needle: &str) -> Option<&'t TokenDescriptor> {
    let needle = needle.trim();
    tokens
        .iter()
        .find(|t| t.matches_address(needle))
        .or_else(|| tokens.iter().find(|t| t.symbol.eq_ignore_ascii_case(needle)))
}

async fn run_quote(
    config_path: Option<&Path>,
    args: QuoteArgs,
    address: Option<String>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let (config, services) = load_services(config_path)?;
    let address = resolve_address(address, &config)
        .context("no wallet address: pass --address or set SLYCK_WALLET_ADDRESS")?;

    let source_tokens = services.tokens.list_tokens(args.from_chain, &cancel).await?;
    let destination_tokens = load_destination_tokens(&services, &cancel).await?;

    let source = find_token(&source_tokens, &args.from_token).with_context(|| {
        format!(
            "token '{}' not found on chain {}",
            args.from_token, args.from_chain
        )
    })?;
    let destination = find_token(&destination_tokens, &args.to_token).with_context(|| {
        format!(
            "token '{}' not found on {DESTINATION_CHAIN_NAME} ({DESTINATION_CHAIN_ID})",
            args.to_token
        )
    })?;

    let policy = AutoDepositPolicy::new(&config.bridge.auto_deposit_symbols);
    let mut form = ConfigureForm::default();
    form.select_source_chain(args.from_chain);
    form.select_source_token(source.address.clone());
    form.amount = args.amount;
    form.select_destination_token(destination, &policy);

    let request = form.build_quote_request(&address, &source_tokens)?;
    let quote = services.quotes.get_quote(&request, &cancel).await?;
    let summary = ReviewSummary::from_quote(&quote)?;

    termimad::MadSkin::default().print_text(&review_markdown(&summary));
    println!("Quote {} via {}", quote.id, quote.tool_name());
    Ok(())
}
