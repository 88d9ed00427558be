//! Configuration for Slyck.
//!
//! Settings are loaded with priority: env var > `~/.slyck/config.toml` >
//! `~/.slyck/settings.json` > default. `./.env` and `~/.slyck/.env` are
//! loaded through dotenvy first, so they behave like env vars.

pub(crate) mod helpers;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::model::{DESTINATION_CHAIN_ID, DESTINATION_RPC_URL};
use crate::services::is_valid_evm_address;
use crate::settings::{Settings, validate_http_endpoint};

pub const LIFI_DEFAULT_API_BASE_URL: &str = "https://li.quest/v1";

/// Main configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub lifi: LifiConfig,
    pub wallet: WalletConfig,
    pub execution: ExecutionConfig,
    pub bridge: BridgeConfig,
}

/// LI.FI routing API access.
#[derive(Debug, Clone)]
pub struct LifiConfig {
    pub api_base_url: String,
    pub integrator: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

impl LifiConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let api_base_url = helpers::optional_env("LIFI_API_BASE_URL")?
            .or_else(|| settings.lifi.api_base_url.clone())
            .unwrap_or_else(|| LIFI_DEFAULT_API_BASE_URL.to_string());
        validate_http_endpoint(&api_base_url).map_err(|message| ConfigError::InvalidValue {
            key: "LIFI_API_BASE_URL".to_string(),
            message,
        })?;

        let integrator = helpers::optional_env("LIFI_INTEGRATOR")?
            .unwrap_or_else(|| settings.lifi.integrator.clone());
        if integrator.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "LIFI_INTEGRATOR".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let api_key = helpers::optional_env("LIFI_API_KEY")?.map(SecretString::from);

        let timeout_ms = helpers::require_positive(
            "LIFI_TIMEOUT_MS",
            helpers::parse_optional_env("LIFI_TIMEOUT_MS", settings.lifi.timeout_ms)?,
        )?;

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            integrator,
            api_key,
            timeout: Duration::from_millis(timeout_ms),
        })
    }
}

/// Default account for the wizard and one-shot commands.
#[derive(Debug, Clone, Default)]
pub struct WalletConfig {
    pub address: Option<String>,
}

impl WalletConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let address =
            helpers::optional_env("SLYCK_WALLET_ADDRESS")?.or_else(|| settings.wallet_address.clone());
        if let Some(ref address) = address
            && !is_valid_evm_address(address)
        {
            return Err(ConfigError::InvalidValue {
                key: "SLYCK_WALLET_ADDRESS".to_string(),
                message: format!("expected a 0x-prefixed 20-byte hex address, got '{address}'"),
            });
        }
        Ok(Self { address })
    }
}

/// Transaction tracking and chain RPC access.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub status_poll_interval: Duration,
    pub status_timeout: Duration,
    /// RPC endpoints that win over chain metadata, keyed by chain id.
    pub rpc_urls: HashMap<u64, String>,
}

impl ExecutionConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let poll_ms = helpers::require_positive(
            "SLYCK_STATUS_POLL_INTERVAL_MS",
            helpers::parse_optional_env(
                "SLYCK_STATUS_POLL_INTERVAL_MS",
                settings.execution.status_poll_interval_ms,
            )?,
        )?;
        let timeout_secs = helpers::require_positive(
            "SLYCK_STATUS_TIMEOUT_SECS",
            helpers::parse_optional_env(
                "SLYCK_STATUS_TIMEOUT_SECS",
                settings.execution.status_timeout_secs,
            )?,
        )?;

        let mut rpc_urls = HashMap::new();
        rpc_urls.insert(DESTINATION_CHAIN_ID, DESTINATION_RPC_URL.to_string());
        for (chain_id, url) in &settings.execution.rpc_urls {
            let chain_id = parse_chain_id(chain_id, "execution.rpc_urls")?;
            rpc_urls.insert(chain_id, url.clone());
        }
        if let Some(raw) = helpers::optional_env("SLYCK_RPC_URLS")? {
            rpc_urls.extend(parse_rpc_urls(&raw)?);
        }

        Ok(Self {
            status_poll_interval: Duration::from_millis(poll_ms),
            status_timeout: Duration::from_secs(timeout_secs),
            rpc_urls,
        })
    }
}

/// Bridge form behaviour.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Upper-cased destination symbols eligible for auto-deposit.
    pub auto_deposit_symbols: Vec<String>,
}

impl BridgeConfig {
    pub(crate) fn resolve(settings: &Settings) -> Result<Self, ConfigError> {
        let symbols = match helpers::optional_env("SLYCK_AUTO_DEPOSIT_SYMBOLS")? {
            Some(raw) => raw.split(',').map(str::to_string).collect(),
            None => settings.bridge.auto_deposit_symbols.clone(),
        };
        let auto_deposit_symbols = symbols
            .iter()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        Ok(Self {
            auto_deposit_symbols,
        })
    }
}

fn parse_chain_id(raw: &str, key: &str) -> Result<u64, ConfigError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("chain id '{raw}' is not a number: {e}"),
        })
}

/// Parse `<chainId>=<url>` pairs separated by commas.
fn parse_rpc_urls(raw: &str) -> Result<HashMap<u64, String>, ConfigError> {
    let mut urls = HashMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (chain_id, url) = entry.split_once('=').ok_or_else(|| ConfigError::InvalidValue {
            key: "SLYCK_RPC_URLS".to_string(),
            message: format!("expected '<chainId>=<url>', got '{entry}'"),
        })?;
        let chain_id = parse_chain_id(chain_id, "SLYCK_RPC_URLS")?;
        validate_http_endpoint(url).map_err(|message| ConfigError::InvalidValue {
            key: "SLYCK_RPC_URLS".to_string(),
            message,
        })?;
        urls.insert(chain_id, url.trim().to_string());
    }
    Ok(urls)
}

impl Config {
    /// Load configuration from env vars and on-disk settings.
    ///
    /// If `toml_path` is `Some`, that file must exist and parse. Otherwise
    /// `~/.slyck/config.toml` is used when present.
    pub fn load(toml_path: Option<&Path>) -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        crate::bootstrap::load_slyck_env();
        let mut settings = Settings::load();
        Self::apply_toml_overlay(&mut settings, toml_path)?;
        Self::from_settings(&settings)
    }

    /// Resolve configuration from already-loaded settings plus env vars.
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        Ok(Self {
            lifi: LifiConfig::resolve(settings)?,
            wallet: WalletConfig::resolve(settings)?,
            execution: ExecutionConfig::resolve(settings)?,
            bridge: BridgeConfig::resolve(settings)?,
        })
    }

    fn apply_toml_overlay(
        settings: &mut Settings,
        explicit_path: Option<&Path>,
    ) -> Result<(), ConfigError> {
        let path = explicit_path
            .map(PathBuf::from)
            .unwrap_or_else(Settings::default_toml_path);

        match Settings::load_toml(&path) {
            Ok(Some(toml_settings)) => {
                settings.merge_from(&toml_settings);
                tracing::debug!("Loaded TOML config from {}", path.display());
            }
            Ok(None) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
            }
            Err(e) => {
                if explicit_path.is_some() {
                    return Err(ConfigError::ParseError(format!(
                        "Failed to load config file {}: {}",
                        path.display(),
                        e
                    )));
                }
                tracing::warn!("Failed to load default config file: {}", e);
            }
        }
        Ok(())
    }
}
