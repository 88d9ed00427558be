use std::io;

use tokio_util::sync::CancellationToken;

use super::frontend::{Notice, WizardFrontend};
use super::review::ReviewSummary;
use crate::amount;
use crate::error::{DirectoryError, QuoteError, ValidationError};
use crate::model::{
    ChainDescriptor, ChainType, DESTINATION_CHAIN_ID, DESTINATION_CHAIN_NAME, Quote, QuoteRequest,
    TokenDescriptor,
};
use crate::services::BridgeServices;

pub const AUTO_DEPOSIT_LABEL: &str = "Auto-deposit to Hyperliquid trading account";
const QUOTE_FAILED_MESSAGE: &str = "Failed to get quote. Please try again.";

/// Destination symbols for which the auto-deposit toggle is offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoDepositPolicy {
    symbols: Vec<String>,
}

impl Default for AutoDepositPolicy {
    fn default() -> Self {
        Self::new(["USDC", "HYPE"])
    }
}

impl AutoDepositPolicy {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            symbols: symbols
                .into_iter()
                .map(|s| s.as_ref().trim().to_ascii_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    /// Exact, case-insensitive symbol match.
    pub fn is_eligible(&self, symbol: &str) -> bool {
        let symbol = symbol.trim();
        self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }
}

/// User inputs on the Configure step. Survives a Back from Review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigureForm {
    pub source_chain_id: Option<u64>,
    /// Source token address.
    pub source_token: Option<String>,
    /// Destination token address on HyperEVM.
    pub destination_token: Option<String>,
    /// Amount in display units, as typed.
    pub amount: String,
    pub auto_deposit: bool,
    auto_deposit_eligible: bool,
}

impl ConfigureForm {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.source_chain_id.is_none() {
            missing.push("source chain");
        }
        if self.source_token.is_none() {
            missing.push("source token");
        }
        if self.destination_token.is_none() {
            missing.push("destination token");
        }
        if !amount::is_positive(&self.amount) {
            missing.push("amount");
        }
        missing
    }

    pub fn can_submit(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Choosing a different chain clears the source token.
    pub fn select_source_chain(&mut self, chain_id: u64) {
        if self.source_chain_id != Some(chain_id) {
            self.source_token = None;
        }
        self.source_chain_id = Some(chain_id);
    }

    pub fn select_source_token(&mut self, address: impl Into<String>) {
        self.source_token = Some(address.into());
    }

    /// Select the destination token; an ineligible token resets the toggle.
    pub fn select_destination_token(&mut self, token: &TokenDescriptor, policy: &AutoDepositPolicy) {
        self.destination_token = Some(token.address.clone());
        self.auto_deposit_eligible = policy.is_eligible(&token.symbol);
        if !self.auto_deposit_eligible {
            self.auto_deposit = false;
        }
    }

    pub fn auto_deposit_available(&self) -> bool {
        self.auto_deposit_eligible
    }

    pub fn toggle_auto_deposit(&mut self) {
        if self.auto_deposit_eligible {
            self.auto_deposit = !self.auto_deposit;
        }
    }

    pub fn selected_source<'t>(&self, tokens: &'t [TokenDescriptor]) -> Option<&'t TokenDescriptor> {
        let address = self.source_token.as_deref()?;
        tokens.iter().find(|t| t.matches_address(address))
    }

    /// Set the amount to the selected token's full balance in display units.
    ///
    /// Leaves the amount untouched when the balance is unknown or zero.
    pub fn use_max(&mut self, tokens: &[TokenDescriptor]) -> Result<String, ValidationError> {
        let Some(address) = self.source_token.as_deref() else {
            return Err(ValidationError::MissingFields(vec!["source token"]));
        };
        let token = self
            .selected_source(tokens)
            .ok_or_else(|| ValidationError::UnknownToken {
                address: address.to_string(),
            })?;
        let balance = token
            .balance
            .filter(|b| *b > 0)
            .ok_or_else(|| ValidationError::NoBalance {
                symbol: token.symbol.clone(),
            })?;
        let display = amount::format_units(balance, token.decimals);
        self.amount = display.clone();
        Ok(display)
    }

    /// Assemble the quote request from the form. Never contacts a service.
    pub fn build_quote_request(
        &self,
        from_address: &str,
        source_tokens: &[TokenDescriptor],
    ) -> Result<QuoteRequest, ValidationError> {
        let (Some(chain_id), Some(token_address), Some(destination)) = (
            self.source_chain_id,
            self.source_token.as_deref(),
            self.destination_token.as_deref(),
        ) else {
            return Err(ValidationError::MissingFields(self.missing_fields()));
        };
        if self.amount.trim().is_empty() {
            return Err(ValidationError::MissingFields(vec!["amount"]));
        }

        let token = self
            .selected_source(source_tokens)
            .ok_or_else(|| ValidationError::UnknownToken {
                address: token_address.to_string(),
            })?;
        let raw = amount::to_base_units(&self.amount, token.decimals).map_err(|e| {
            ValidationError::InvalidAmount {
                value: self.amount.clone(),
                reason: e.to_string(),
            }
        })?;
        if raw == 0 {
            return Err(ValidationError::ZeroAmount);
        }

        Ok(QuoteRequest::to_destination(
            chain_id,
            token.address.clone(),
            raw,
            from_address,
            destination,
        ))
    }
}

/// Mainnet source chains of the supported types.
pub async fn load_chains(
    services: &BridgeServices,
    cancel: &CancellationToken,
) -> Result<Vec<ChainDescriptor>, DirectoryError> {
    let chains = services
        .chains
        .list_chains(&ChainType::SOURCE_TYPES, cancel)
        .await?;
    Ok(chains.into_iter().filter(|c| c.mainnet).collect())
}

/// Source tokens and whether they were filtered by balance.
#[derive(Debug, Clone, Default)]
pub struct SourceTokens {
    pub tokens: Vec<TokenDescriptor>,
    pub balances_known: bool,
}

/// Tokens with a logo on `chain_id` that `address` holds a balance of.
///
/// Chains without balance support fall back to the full list.
pub async fn load_source_tokens(
    services: &BridgeServices,
    chain_id: u64,
    address: &str,
    cancel: &CancellationToken,
) -> Result<SourceTokens, DirectoryError> {
    let tokens: Vec<TokenDescriptor> = services
        .tokens
        .list_tokens(chain_id, cancel)
        .await?
        .into_iter()
        .filter(TokenDescriptor::has_logo)
        .collect();

    match services
        .tokens
        .list_balances(address, tokens.clone(), cancel)
        .await
    {
        Ok(with_balances) => Ok(SourceTokens {
            tokens: with_balances
                .into_iter()
                .filter(|t| t.balance.is_some_and(|b| b > 0))
                .collect(),
            balances_known: true,
        }),
        Err(DirectoryError::BalancesUnavailable { chain_id, reason }) => {
            tracing::debug!(chain_id, "Balances unavailable: {}", reason);
            Ok(SourceTokens {
                tokens,
                balances_known: false,
            })
        }
        Err(e) => Err(e),
    }
}

/// HyperEVM tokens with a logo. No balance filtering.
pub async fn load_destination_tokens(
    services: &BridgeServices,
    cancel: &CancellationToken,
) -> Result<Vec<TokenDescriptor>, DirectoryError> {
    Ok(services
        .tokens
        .list_tokens(DESTINATION_CHAIN_ID, cancel)
        .await?
        .into_iter()
        .filter(TokenDescriptor::has_logo)
        .collect())
}

#[derive(Debug)]
pub enum ConfigureOutcome {
    Quoted(Quote),
    Abandoned,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    SourceChain,
    SourceToken,
    Amount,
    UseMax,
    DestinationToken,
    AutoDeposit,
    GetQuote,
    Quit,
}

/// Interactive Configure step for one connected address.
pub struct ConfigureStep<'a> {
    services: &'a BridgeServices,
    frontend: &'a dyn WizardFrontend,
    policy: &'a AutoDepositPolicy,
    address: String,
    cancel: CancellationToken,
}

impl<'a> ConfigureStep<'a> {
    pub fn new(
        services: &'a BridgeServices,
        frontend: &'a dyn WizardFrontend,
        policy: &'a AutoDepositPolicy,
        address: impl Into<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            services,
            frontend,
            policy,
            address: address.into(),
            cancel,
        }
    }

    async fn report_directory_error(&self, what: &str, err: &DirectoryError) -> io::Result<()> {
        tracing::warn!("Failed to load {}: {}", what, err);
        self.frontend
            .notify(Notice::Error, &format!("Failed to load {what}: {err}"))
            .await
    }

    async fn reload_source_tokens(&self, chain_id: u64) -> io::Result<Vec<TokenDescriptor>> {
        match load_source_tokens(self.services, chain_id, &self.address, &self.cancel).await {
            Ok(loaded) => {
                if !loaded.balances_known {
                    self.frontend
                        .notify(
                            Notice::Info,
                            "Balances are not available for this chain; showing all tokens.",
                        )
                        .await?;
                } else if loaded.tokens.is_empty() {
                    self.frontend
                        .notify(Notice::Warning, "No token balances found on this chain.")
                        .await?;
                }
                Ok(loaded.tokens)
            }
            Err(DirectoryError::Cancelled) => Ok(Vec::new()),
            Err(e) => {
                self.report_directory_error("tokens", &e).await?;
                Ok(Vec::new())
            }
        }
    }

    fn menu(
        &self,
        form: &ConfigureForm,
        chains: &[ChainDescriptor],
        source_tokens: &[TokenDescriptor],
        destination_tokens: &[TokenDescriptor],
    ) -> Vec<(MenuAction, String)> {
        let chain_label = form
            .source_chain_id
            .map(|id| {
                chains
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| format!("Chain {id}"))
            })
            .unwrap_or_else(|| "Select chain".to_string());
        let selected = form.selected_source(source_tokens);
        let token_label = match (form.source_chain_id, selected) {
            (None, _) => "Select chain first".to_string(),
            (Some(_), None) => "Select token".to_string(),
            (Some(_), Some(token)) => token.symbol.clone(),
        };
        let amount_label = if form.amount.trim().is_empty() {
            "0.0".to_string()
        } else {
            form.amount.clone()
        };
        let balance_label = selected
            .and_then(|t| t.balance.map(|b| (t, b)))
            .map(|(t, b)| format!(" (balance {} {})", amount::format_fixed(b, t.decimals, 4), t.symbol))
            .unwrap_or_default();
        let destination_label = form
            .destination_token
            .as_deref()
            .and_then(|addr| destination_tokens.iter().find(|t| t.matches_address(addr)))
            .map(|t| t.symbol.clone())
            .unwrap_or_else(|| "Select token".to_string());

        let mut items = vec![
            (MenuAction::SourceChain, format!("From chain: {chain_label}")),
            (MenuAction::SourceToken, format!("Token: {token_label}")),
            (
                MenuAction::Amount,
                format!("Amount: {amount_label}{balance_label}"),
            ),
        ];
        if selected.is_some() {
            items.push((MenuAction::UseMax, "Use max".to_string()));
        }
        items.push((
            MenuAction::DestinationToken,
            format!("To {DESTINATION_CHAIN_NAME}: {destination_label}"),
        ));
        if form.auto_deposit_available() {
            let mark = if form.auto_deposit { "x" } else { " " };
            items.push((MenuAction::AutoDeposit, format!("[{mark}] {AUTO_DEPOSIT_LABEL}")));
        }
        let quote_label = if form.can_submit() {
            "Get quote".to_string()
        } else {
            "Get quote (fill in all fields)".to_string()
        };
        items.push((MenuAction::GetQuote, quote_label));
        items.push((MenuAction::Quit, "Quit".to_string()));
        items
    }

    pub async fn run(&self, form: &mut ConfigureForm) -> io::Result<ConfigureOutcome> {
        let (chains, destination_tokens) = tokio::join!(
            load_chains(self.services, &self.cancel),
            load_destination_tokens(self.services, &self.cancel),
        );
        let mut chains = match chains {
            Ok(chains) => chains,
            Err(e) => {
                self.report_directory_error("chains", &e).await?;
                Vec::new()
            }
        };
        let mut destination_tokens = match destination_tokens {
            Ok(tokens) => tokens,
            Err(e) => {
                self.report_directory_error("destination tokens", &e).await?;
                Vec::new()
            }
        };
        let mut source_tokens = match form.source_chain_id {
            Some(chain_id) => self.reload_source_tokens(chain_id).await?,
            None => Vec::new(),
        };

        loop {
            if self.cancel.is_cancelled() {
                return Ok(ConfigureOutcome::Cancelled);
            }

            let items = self.menu(form, &chains, &source_tokens, &destination_tokens);
            let labels: Vec<String> = items.iter().map(|(_, label)| label.clone()).collect();
            let choice = self.frontend.select("Configure your bridge", &labels).await?;
            let Some((action, _)) = items.get(choice) else {
                continue;
            };

            match action {
                MenuAction::SourceChain => {
                    if chains.is_empty() {
                        match load_chains(self.services, &self.cancel).await {
                            Ok(loaded) => chains = loaded,
                            Err(e) => {
                                self.report_directory_error("chains", &e).await?;
                                continue;
                            }
                        }
                    }
                    if chains.is_empty() {
                        self.frontend
                            .notify(Notice::Warning, "No chains available.")
                            .await?;
                        continue;
                    }
                    let names: Vec<String> = chains.iter().map(|c| c.name.clone()).collect();
                    let index = self.frontend.select("From chain", &names).await?;
                    if let Some(chain) = chains.get(index) {
                        let changed = form.source_chain_id != Some(chain.id);
                        form.select_source_chain(chain.id);
                        if changed || source_tokens.is_empty() {
                            source_tokens = self.reload_source_tokens(chain.id).await?;
                        }
                    }
                }
                MenuAction::SourceToken => {
                    let Some(chain_id) = form.source_chain_id else {
                        self.frontend
                            .notify(Notice::Warning, "Select chain first.")
                            .await?;
                        continue;
                    };
                    if source_tokens.is_empty() {
                        source_tokens = self.reload_source_tokens(chain_id).await?;
                        if source_tokens.is_empty() {
                            continue;
                        }
                    }
                    let labels: Vec<String> = source_tokens.iter().map(token_label).collect();
                    let index = self.frontend.select("Token", &labels).await?;
                    if let Some(token) = source_tokens.get(index) {
                        form.select_source_token(token.address.clone());
                    }
                }
                MenuAction::Amount => {
                    form.amount = self.frontend.input("Amount").await?.trim().to_string();
                    if !form.amount.is_empty() && !amount::is_positive(&form.amount) {
                        self.frontend
                            .notify(Notice::Warning, "Enter a positive number.")
                            .await?;
                    }
                }
                MenuAction::UseMax => match form.use_max(&source_tokens) {
                    Ok(max) => tracing::debug!(amount = %max, "Using max balance"),
                    Err(e) => self.frontend.notify(Notice::Warning, &e.to_string()).await?,
                },
                MenuAction::DestinationToken => {
                    if destination_tokens.is_empty() {
                        match load_destination_tokens(self.services, &self.cancel).await {
                            Ok(loaded) => destination_tokens = loaded,
                            Err(e) => {
                                self.report_directory_error("destination tokens", &e).await?;
                                continue;
                            }
                        }
                    }
                    let labels: Vec<String> =
                        destination_tokens.iter().map(|t| t.symbol.clone()).collect();
                    let index = self
                        .frontend
                        .select(&format!("To token on {DESTINATION_CHAIN_NAME}"), &labels)
                        .await?;
                    if let Some(token) = destination_tokens.get(index) {
                        form.select_destination_token(token, self.policy);
                    }
                }
                MenuAction::AutoDeposit => form.toggle_auto_deposit(),
                MenuAction::GetQuote => {
                    if !form.can_submit() {
                        self.frontend
                            .notify(Notice::Warning, "Please fill in all fields")
                            .await?;
                        continue;
                    }
                    match self.request_quote(form, &source_tokens).await? {
                        Some(Ok(quote)) => return Ok(ConfigureOutcome::Quoted(quote)),
                        Some(Err(QuoteError::Cancelled)) => {
                            return Ok(ConfigureOutcome::Cancelled);
                        }
                        Some(Err(_)) | None => {}
                    }
                }
                MenuAction::Quit => return Ok(ConfigureOutcome::Abandoned),
            }
        }
    }

    /// `None` when validation failed locally and no request was made.
    async fn request_quote(
        &self,
        form: &ConfigureForm,
        source_tokens: &[TokenDescriptor],
    ) -> io::Result<Option<Result<Quote, QuoteError>>> {
        let request = match form.build_quote_request(&self.address, source_tokens) {
            Ok(request) => request,
            Err(e) => {
                self.frontend.notify(Notice::Warning, &e.to_string()).await?;
                return Ok(None);
            }
        };

        self.frontend.notify(Notice::Info, "Fetching quote...").await?;
        let result = self
            .services
            .quotes
            .get_quote(&request, &self.cancel)
            .await
            .and_then(|quote| ReviewSummary::from_quote(&quote).map(|_| quote));

        match &result {
            Ok(quote) => {
                tracing::info!(quote_id = %quote.id, tool = %quote.tool_name(), "Quote received");
            }
            Err(QuoteError::Cancelled) => {}
            Err(e) => {
                tracing::warn!("Failed to get quote: {}", e);
                self.frontend
                    .notify(Notice::Error, &format!("{QUOTE_FAILED_MESSAGE} ({e})"))
                    .await?;
            }
        }
        Ok(Some(result))
    }
}

fn token_label(token: &TokenDescriptor) -> String {
    match token.balance {
        Some(balance) => format!(
            "{} ({})",
            token.symbol,
            amount::format_fixed(balance, token.decimals, 4)
        ),
        None => token.symbol.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn usdc() -> TokenDescriptor {
        TokenDescriptor::new(1, "0xA", "USDC", 6)
            .with_logo("https://example.com/usdc.png")
            .with_balance(12_345_678)
    }

    fn filled_form() -> ConfigureForm {
        let mut form = ConfigureForm::default();
        form.select_source_chain(1);
        form.select_source_token("0xA");
        form.select_destination_token(
            &TokenDescriptor::new(999, "0xB", "USDC", 6),
            &AutoDepositPolicy::default(),
        );
        form.amount = "10".to_string();
        form
    }

    #[test]
    fn builds_raw_amount_from_display_amount() {
        let request = filled_form()
            .build_quote_request("0xuser", &[usdc()])
            .unwrap();
        assert_eq!(request.from_chain_id, 1);
        assert_eq!(request.from_token_address, "0xA");
        assert_eq!(request.from_amount_raw, "10000000");
        assert_eq!(request.to_chain_id, DESTINATION_CHAIN_ID);
        assert_eq!(request.to_token_address, "0xB");
        assert_eq!(request.from_address, "0xuser");
    }

    #[test]
    fn incomplete_form_is_rejected_before_any_request() {
        let mut form = filled_form();
        form.amount.clear();
        assert!(!form.can_submit());
        assert_eq!(
            form.build_quote_request("0xuser", &[usdc()]).unwrap_err(),
            ValidationError::MissingFields(vec!["amount"])
        );

        let empty = ConfigureForm::default();
        assert_eq!(
            empty.missing_fields(),
            vec!["source chain", "source token", "destination token", "amount"]
        );
    }

    #[test]
    fn bad_amounts_are_rejected() {
        let mut form = filled_form();
        form.amount = "1e5".to_string();
        assert!(matches!(
            form.build_quote_request("0xuser", &[usdc()]),
            Err(ValidationError::InvalidAmount { .. })
        ));

        form.amount = "0.0000001".to_string();
        assert_eq!(
            form.build_quote_request("0xuser", &[usdc()]).unwrap_err(),
            ValidationError::ZeroAmount
        );

        form.amount = "1".to_string();
        assert!(matches!(
            form.build_quote_request("0xuser", &[]),
            Err(ValidationError::UnknownToken { .. })
        ));
    }

    #[test]
    fn changing_chain_clears_token() {
        let mut form = filled_form();
        form.select_source_chain(1);
        assert_eq!(form.source_token.as_deref(), Some("0xA"));
        form.select_source_chain(42161);
        assert_eq!(form.source_token, None);
    }

    #[test]
    fn use_max_sets_display_balance() {
        let mut form = filled_form();
        assert_eq!(form.use_max(&[usdc()]).as_deref(), Ok("12.345678"));
        assert_eq!(form.amount, "12.345678");
    }

    #[test]
    fn use_max_without_balance_is_rejected() {
        let mut unknown = filled_form();
        let token = TokenDescriptor::new(1, "0xA", "USDC", 6);
        assert_eq!(
            unknown.use_max(&[token]),
            Err(ValidationError::NoBalance {
                symbol: "USDC".into()
            })
        );
        assert_eq!(unknown.amount, "10");

        let mut empty = filled_form();
        let token = TokenDescriptor::new(1, "0xA", "USDC", 6).with_balance(0);
        assert!(matches!(
            empty.use_max(&[token]),
            Err(ValidationError::NoBalance { .. })
        ));
        assert_eq!(empty.amount, "10");

        let mut unselected = ConfigureForm::default();
        assert_eq!(
            unselected.use_max(&[usdc()]),
            Err(ValidationError::MissingFields(vec!["source token"]))
        );
    }

    #[test]
    fn auto_deposit_follows_allow_list() {
        let policy = AutoDepositPolicy::default();
        assert!(policy.is_eligible("USDC"));
        assert!(policy.is_eligible("hype"));
        assert!(!policy.is_eligible("DAI"));
        assert!(!policy.is_eligible("USDC.e"));
        assert!(!policy.is_eligible("WHYPE"));

        let mut form = filled_form();
        assert!(form.auto_deposit_available());
        form.toggle_auto_deposit();
        assert!(form.auto_deposit);

        form.select_destination_token(&TokenDescriptor::new(999, "0xD", "DAI", 18), &policy);
        assert!(!form.auto_deposit_available());
        assert!(!form.auto_deposit);
        form.toggle_auto_deposit();
        assert!(!form.auto_deposit);
    }
}
