//! `slyck doctor` - active health diagnostics.
//!
//! Validates configuration and probes LI.FI and the HyperEVM RPC so routing
//! or signing problems surface before a bridge is attempted. Each check
//! reports pass/fail with actionable guidance on failures.

use std::path::Path;

use secrecy::ExposeSecret;

use crate::config::Config;
use crate::lifi::EvmRpc;
use crate::lifi::health::probe_endpoint;
use crate::model::{DESTINATION_CHAIN_ID, DESTINATION_CHAIN_NAME, DESTINATION_RPC_URL};
use crate::settings::Settings;

/// Run diagnostic checks and print results.
pub async fn run_doctor_command(config_path: Option<&Path>, strict: bool) -> anyhow::Result<()> {
    println!("Slyck Doctor");
    println!("============\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    let config = Config::load(config_path);

    check(
        "Configuration",
        match &config {
            Ok(_) => CheckResult::Pass("env, config.toml and settings.json resolved".to_string()),
            Err(e) => CheckResult::Fail(e.to_string()),
        },
        &mut passed,
        &mut failed,
    );

    check(
        "Settings files",
        check_settings_files(config_path),
        &mut passed,
        &mut failed,
    );

    match &config {
        Ok(config) => {
            check(
                "Wallet address",
                check_wallet_address(config),
                &mut passed,
                &mut failed,
            );

            check("LI.FI API key", check_api_key(config), &mut passed, &mut failed);

            check(
                "LI.FI API reachability",
                check_lifi_reachability(config).await,
                &mut passed,
                &mut failed,
            );

            check(
                "HyperEVM RPC",
                check_destination_rpc(config).await,
                &mut passed,
                &mut failed,
            );
        }
        Err(_) => {
            for name in [
                "Wallet address",
                "LI.FI API key",
                "LI.FI API reachability",
                "HyperEVM RPC",
            ] {
                check(
                    name,
                    CheckResult::Skip("configuration did not resolve".to_string()),
                    &mut passed,
                    &mut failed,
                );
            }
        }
    }

    println!();
    println!("  {passed} passed, {failed} failed");

    if failed > 0 {
        println!("\n  Fix the failed checks before running `slyck bridge`.");
        if strict {
            anyhow::bail!("doctor strict mode failed with {failed} check(s)");
        }
    }

    Ok(())
}

// ── Individual checks ───────────────────────────────────────

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn check_settings_files(config_path: Option<&Path>) -> CheckResult {
    let toml_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_toml_path);
    let json_path = Settings::default_path();

    if let Err(e) = Settings::load_toml(&toml_path) {
        return CheckResult::Fail(e);
    }

    let found: Vec<String> = [&toml_path, &json_path]
        .into_iter()
        .filter(|p| p.exists())
        .map(|p| p.display().to_string())
        .collect();
    if found.is_empty() {
        CheckResult::Skip("no settings files, using defaults (run `slyck config init`)".to_string())
    } else {
        CheckResult::Pass(found.join(", "))
    }
}

fn check_wallet_address(config: &Config) -> CheckResult {
    match config.wallet.address.as_deref() {
        Some(address) => CheckResult::Pass(mask_wallet_address(address)),
        None => CheckResult::Skip(
            "not configured; pass --address or set SLYCK_WALLET_ADDRESS".to_string(),
        ),
    }
}

fn check_api_key(config: &Config) -> CheckResult {
    match &config.lifi.api_key {
        Some(key) if !key.expose_secret().trim().is_empty() => {
            CheckResult::Pass("LIFI_API_KEY set".to_string())
        }
        _ => CheckResult::Skip("LIFI_API_KEY not set; public rate limits apply".to_string()),
    }
}

async fn check_lifi_reachability(config: &Config) -> CheckResult {
    let url = format!("{}/chains?chainTypes=EVM", config.lifi.api_base_url);
    let health = probe_endpoint("LI.FI", &url, config.lifi.timeout).await;
    if health.is_healthy() {
        CheckResult::Pass(format!(
            "{} ({})",
            redact_url_for_display(&config.lifi.api_base_url),
            health.detail
        ))
    } else {
        CheckResult::Fail(format!(
            "{} at {}: {}",
            health.state.as_str(),
            redact_url_for_display(&config.lifi.api_base_url),
            health.detail
        ))
    }
}

async fn check_destination_rpc(config: &Config) -> CheckResult {
    let url = config
        .execution
        .rpc_urls
        .get(&DESTINATION_CHAIN_ID)
        .map(String::as_str)
        .unwrap_or(DESTINATION_RPC_URL);

    let rpc = match EvmRpc::new(config.lifi.timeout) {
        Ok(rpc) => rpc,
        Err(e) => return CheckResult::Fail(format!("cannot construct RPC client: {e}")),
    };

    match rpc.chain_id(url).await {
        Ok(DESTINATION_CHAIN_ID) => CheckResult::Pass(format!(
            "{} (chain {DESTINATION_CHAIN_ID})",
            redact_url_for_display(url)
        )),
        Ok(other) => CheckResult::Fail(format!(
            "{} reports chain {other}, expected {DESTINATION_CHAIN_NAME} ({DESTINATION_CHAIN_ID})",
            redact_url_for_display(url)
        )),
        Err(e) => CheckResult::Fail(format!(
            "{} unreachable: {e}",
            redact_url_for_display(url)
        )),
    }
}

fn mask_wallet_address(address: &str) -> String {
    let address = address.trim();
    if address.len() < 10 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

fn redact_url_for_display(raw: &str) -> String {
    match reqwest::Url::parse(raw) {
        Ok(mut url) => {
            if !url.username().is_empty() {
                let _ = url.set_username("redacted");
            }
            if url.password().is_some() {
                let _ = url.set_password(Some("redacted"));
            }
            url.to_string()
        }
        Err(_) => "<invalid-url>".to_string(),
    }
}
