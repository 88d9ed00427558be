//! `slyck config` subcommands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use secrecy::ExposeSecret;

use super::prompts::{
    confirm, optional_input, print_error, print_header, print_info, print_step, print_success,
    secret_input,
};
use crate::bootstrap;
use crate::config::Config;
use crate::services::is_valid_evm_address;
use crate::settings::Settings;

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Interactively write ~/.slyck/config.toml and store the API key.
    Init {
        /// Overwrite an existing config.toml.
        #[arg(long)]
        force: bool,
    },

    /// Show the fully resolved configuration.
    Show,

    /// Print one setting by dotted path (e.g. lifi.timeout_ms).
    Get { key: String },

    /// Set a setting in ~/.slyck/settings.json.
    Set { key: String, value: String },

    /// List all settings with their current values.
    List,

    /// Reset a setting to its default.
    Reset { key: String },
}

pub async fn run_config_command(
    command: ConfigCommand,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Init { force } => init(config_path, force).await,
        ConfigCommand::Show => show(config_path),
        ConfigCommand::Get { key } => {
            let settings = load_merged(config_path)?;
            match settings.get(&key) {
                Some(value) => {
                    println!("{value}");
                    Ok(())
                }
                None => anyhow::bail!("Unknown setting: {key}"),
            }
        }
        ConfigCommand::Set { key, value } => {
            let path = Settings::default_path();
            let mut settings = Settings::load_from(&path);
            settings.set(&key, &value).map_err(anyhow::Error::msg)?;
            settings.save_to(&path).map_err(anyhow::Error::msg)?;
            println!("Set {key} = {}", settings.get(&key).unwrap_or_default());
            warn_if_overridden(config_path, &key, &settings);
            Ok(())
        }
        ConfigCommand::List => {
            let settings = load_merged(config_path)?;
            for (key, value) in settings.list() {
                println!("{key} = {value}");
            }
            Ok(())
        }
        ConfigCommand::Reset { key } => {
            let path = Settings::default_path();
            let mut settings = Settings::load_from(&path);
            settings.reset(&key).map_err(anyhow::Error::msg)?;
            settings.save_to(&path).map_err(anyhow::Error::msg)?;
            println!("Reset {key} to default");
            Ok(())
        }
    }
}

fn toml_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_toml_path)
}

/// settings.json overlaid with config.toml, without env vars.
fn load_merged(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = Settings::load();
    if let Some(toml) = Settings::load_toml(&toml_path(config_path)).map_err(anyhow::Error::msg)? {
        settings.merge_from(&toml);
    }
    Ok(settings)
}

fn warn_if_overridden(config_path: Option<&Path>, key: &str, written: &Settings) {
    if let Ok(merged) = load_merged(config_path)
        && merged.get(key) != written.get(key)
    {
        println!(
            "Note: {} sets a different value for {key}; it takes priority.",
            toml_path(config_path).display()
        );
    }
}

fn show(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;

    println!("LI.FI");
    println!("  api_base_url  {}", config.lifi.api_base_url);
    println!("  integrator    {}", config.lifi.integrator);
    println!(
        "  api_key       {}",
        match &config.lifi.api_key {
            Some(key) if !key.expose_secret().is_empty() => "(set)",
            _ => "(not set)",
        }
    );
    println!("  timeout       {:?}", config.lifi.timeout);
    println!();
    println!("Wallet");
    println!(
        "  address       {}",
        config.wallet.address.as_deref().unwrap_or("(not set)")
    );
    println!();
    println!("Execution");
    println!("  poll interval {:?}", config.execution.status_poll_interval);
    println!("  status wait   {:?}", config.execution.status_timeout);
    let mut rpc_urls: Vec<_> = config.execution.rpc_urls.iter().collect();
    rpc_urls.sort();
    for (chain_id, url) in rpc_urls {
        println!("  rpc {chain_id:<9} {url}");
    }
    println!();
    println!("Bridge");
    println!(
        "  auto-deposit  {}",
        config.bridge.auto_deposit_symbols.join(", ")
    );
    Ok(())
}

async fn init(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = toml_path(config_path);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    print_header("Slyck Setup");

    let mut settings = load_merged(config_path)?;

    print_step(1, 3, "Wallet");
    print_info("Default address used by `slyck bridge` and `slyck quote`.");
    let address = tokio::task::spawn_blocking(|| -> std::io::Result<Option<String>> {
        loop {
            let answer = optional_input("Wallet address", Some("leave empty to skip"))?;
            match answer {
                Some(address) if !is_valid_evm_address(&address) => {
                    print_error("Expected 0x followed by 40 hex characters");
                }
                other => return Ok(other),
            }
        }
    })
    .await??;
    if let Some(address) = address {
        settings.wallet_address = Some(address);
    }

    print_step(2, 3, "LI.FI API key");
    print_info("Optional. Raises LI.FI rate limits. Stored in ~/.slyck/.env.");
    let api_key = tokio::task::spawn_blocking(|| -> std::io::Result<Option<String>> {
        if !confirm("Configure an API key?", false)? {
            return Ok(None);
        }
        let key = secret_input("API key")?;
        Ok((!key.trim().is_empty()).then(|| key.trim().to_string()))
    })
    .await??;
    if let Some(key) = api_key {
        bootstrap::save_bootstrap_env(&[("LIFI_API_KEY", &key)])?;
        print_success(&format!(
            "API key saved to {}",
            bootstrap::slyck_env_path().display()
        ));
    }

    print_step(3, 3, "Save");
    settings.save_toml(&path).map_err(anyhow::Error::msg)?;
    print_success(&format!("Wrote {}", path.display()));
    print_info("Run `slyck doctor` to check connectivity.");
    Ok(())
}
