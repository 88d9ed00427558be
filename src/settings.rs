//! User settings persistence.
//!
//! Stores user preferences in `~/.slyck/settings.json` with an optional
//! `~/.slyck/config.toml` overlay. Settings are resolved with
//! env var > config.toml > settings.json > default priority.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::services::is_valid_evm_address;

/// User settings persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Wallet address used when none is given on the command line.
    #[serde(default)]
    pub wallet_address: Option<String>,

    #[serde(default)]
    pub lifi: LifiSettings,

    #[serde(default)]
    pub execution: ExecutionSettings,

    #[serde(default)]
    pub bridge: BridgeSettings,
}

/// LI.FI routing API settings. The API key is env-only (`LIFI_API_KEY`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifiSettings {
    /// Override for the API base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,

    /// Integrator tag attached to every quote.
    #[serde(default = "default_integrator")]
    pub integrator: String,

    #[serde(default = "default_lifi_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_integrator() -> String {
    "slyck".to_string()
}

fn default_lifi_timeout_ms() -> u64 {
    15_000
}

impl Default for LifiSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            integrator: default_integrator(),
            timeout_ms: default_lifi_timeout_ms(),
        }
    }
}

/// Transaction tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    #[serde(default = "default_status_poll_interval_ms")]
    pub status_poll_interval_ms: u64,

    /// How long to wait for a transfer to settle before giving up.
    #[serde(default = "default_status_timeout_secs")]
    pub status_timeout_secs: u64,

    /// Per-chain RPC overrides, keyed by chain id.
    #[serde(default)]
    pub rpc_urls: BTreeMap<String, String>,
}

fn default_status_poll_interval_ms() -> u64 {
    5_000
}

fn default_status_timeout_secs() -> u64 {
    40 * 60
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            status_poll_interval_ms: default_status_poll_interval_ms(),
            status_timeout_secs: default_status_timeout_secs(),
            rpc_urls: BTreeMap::new(),
        }
    }
}

/// Bridge form behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Destination token symbols that offer auto-deposit to the trading account.
    #[serde(default = "default_auto_deposit_symbols")]
    pub auto_deposit_symbols: Vec<String>,
}

fn default_auto_deposit_symbols() -> Vec<String> {
    vec!["USDC".to_string(), "HYPE".to_string()]
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            auto_deposit_symbols: default_auto_deposit_symbols(),
        }
    }
}

/// Validate an http(s) endpoint URL.
pub(crate) fn validate_http_endpoint(raw: &str) -> Result<(), String> {
    let url = url::Url::parse(raw.trim()).map_err(|e| format!("'{}' is not a URL: {}", raw, e))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}', expected http or https", other)),
    }
    if url.host_str().is_none() {
        return Err(format!("'{}' has no host", raw));
    }
    Ok(())
}

fn decode_optional_setting_string(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl Settings {
    /// Directory holding all Slyck user files (`~/.slyck`).
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".slyck")
    }

    /// Default settings file path (`~/.slyck/settings.json`).
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("settings.json")
    }

    /// Load settings from disk, returning default if not found.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable settings file {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings as JSON, creating the parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        let data = serde_json::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize settings: {}", e))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }
        std::fs::write(path, data).map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }

    /// Default TOML config file path (`~/.slyck/config.toml`).
    pub fn default_toml_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Load settings from a TOML file.
    ///
    /// Returns `None` if the file doesn't exist. Returns an error only
    /// if the file exists but can't be parsed.
    pub fn load_toml(path: &Path) -> Result<Option<Self>, String> {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(format!("failed to read {}: {}", path.display(), e)),
        };

        let settings: Self = toml::from_str(&data)
            .map_err(|e| format!("invalid TOML in {}: {}", path.display(), e))?;
        Ok(Some(settings))
    }

    /// Write a commented TOML config file with current settings.
    pub fn save_toml(&self, path: &Path) -> Result<(), String> {
        let raw = toml::to_string_pretty(self)
            .map_err(|e| format!("failed to serialize settings: {}", e))?;

        let content = format!(
            "# Slyck configuration file.\n\
             #\n\
             # Priority: env var > this file > settings.json > defaults.\n\
             # The LI.FI API key is read from LIFI_API_KEY only.\n\
             # Run `slyck config init --force` to regenerate this file.\n\
             \n\
             {raw}"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("failed to create {}: {}", parent.display(), e))?;
        }

        std::fs::write(path, content)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))
    }

    /// Merge values from `other` into `self`, preferring `other` for
    /// fields that differ from the default.
    pub fn merge_from(&mut self, other: &Self) {
        let default_json = match serde_json::to_value(Self::default()) {
            Ok(v) => v,
            Err(_) => return,
        };
        let other_json = match serde_json::to_value(other) {
            Ok(v) => v,
            Err(_) => return,
        };
        let mut self_json = match serde_json::to_value(&*self) {
            Ok(v) => v,
            Err(_) => return,
        };

        merge_non_default(&mut self_json, &other_json, &default_json);

        if let Ok(merged) = serde_json::from_value(self_json) {
            *self = merged;
        }
    }

    /// Get a setting value by dotted path (e.g., "lifi.timeout_ms").
    pub fn get(&self, path: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;

        for part in path.split('.') {
            current = current.get(part)?;
        }

        Some(display_value(current))
    }

    /// Set a setting value by dotted path.
    ///
    /// Returns error if path is invalid or value cannot be parsed.
    pub fn set(&mut self, path: &str, value: &str) -> Result<(), String> {
        match path {
            "wallet_address" => {
                let address = decode_optional_setting_string(value);
                if let Some(ref address) = address
                    && !is_valid_evm_address(address)
                {
                    return Err(format!("Invalid wallet_address '{}'", address));
                }
                self.wallet_address = address;
                return Ok(());
            }
            "lifi.api_base_url" => {
                let endpoint = decode_optional_setting_string(value);
                if let Some(ref endpoint) = endpoint {
                    validate_http_endpoint(endpoint)
                        .map_err(|e| format!("Invalid lifi.api_base_url: {}", e))?;
                }
                self.lifi.api_base_url = endpoint;
                return Ok(());
            }
            "bridge.auto_deposit_symbols" if !value.trim_start().starts_with('[') => {
                self.bridge.auto_deposit_symbols = value
                    .split(',')
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect();
                return Ok(());
            }
            _ => {}
        }

        if let Some(chain_id) = path.strip_prefix("execution.rpc_urls.") {
            chain_id
                .parse::<u64>()
                .map_err(|_| format!("Invalid chain id '{}' in {}", chain_id, path))?;
            match decode_optional_setting_string(value) {
                Some(url) => {
                    validate_http_endpoint(&url).map_err(|e| format!("Invalid {}: {}", path, e))?;
                    self.execution.rpc_urls.insert(chain_id.to_string(), url);
                }
                None => {
                    self.execution.rpc_urls.remove(chain_id);
                }
            }
            return Ok(());
        }

        let mut json = serde_json::to_value(&self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        let (parent_path, final_key) = match path.rsplit_once('.') {
            Some((parent, key)) => (Some(parent), key),
            None => (None, path),
        };
        if final_key.is_empty() {
            return Err("Empty path".to_string());
        }

        let mut current = &mut json;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| format!("Path not found: {}", path))?;
            }
        }

        let obj = current
            .as_object_mut()
            .ok_or_else(|| format!("Parent is not an object: {}", path))?;

        let existing = obj
            .get(final_key)
            .ok_or_else(|| format!("Unknown setting: {}", path))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => {
                let b = value
                    .parse::<bool>()
                    .map_err(|_| format!("Expected boolean for {}, got '{}'", path, value))?;
                serde_json::Value::Bool(b)
            }
            serde_json::Value::Number(_) => {
                let n = value
                    .parse::<u64>()
                    .map_err(|_| format!("Expected integer for {}, got '{}'", path, value))?;
                serde_json::Value::Number(n.into())
            }
            serde_json::Value::Null => serde_json::from_str(value)
                .unwrap_or(serde_json::Value::String(value.to_string())),
            serde_json::Value::Array(_) => serde_json::from_str(value)
                .map_err(|e| format!("Invalid JSON array for {}: {}", path, e))?,
            serde_json::Value::Object(_) => serde_json::from_str(value)
                .map_err(|e| format!("Invalid JSON object for {}: {}", path, e))?,
            serde_json::Value::String(_) => serde_json::Value::String(value.to_string()),
        };

        obj.insert(final_key.to_string(), new_value);

        *self =
            serde_json::from_value(json).map_err(|e| format!("Failed to apply setting: {}", e))?;

        Ok(())
    }

    /// Reset a setting to its default value.
    pub fn reset(&mut self, path: &str) -> Result<(), String> {
        if let Some(chain_id) = path.strip_prefix("execution.rpc_urls.") {
            self.execution.rpc_urls.remove(chain_id);
            return Ok(());
        }

        let default = Self::default();
        let default_value = default
            .get(path)
            .ok_or_else(|| format!("Unknown setting: {}", path))?;

        self.set(path, &default_value)
    }

    /// List all settings as (path, value) pairs.
    pub fn list(&self) -> Vec<(String, String)> {
        let json = match serde_json::to_value(self) {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };

        let mut results = Vec::new();
        collect_settings(&json, String::new(), &mut results);
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => "null".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Recursively collect settings paths and values.
fn collect_settings(
    value: &serde_json::Value,
    prefix: String,
    results: &mut Vec<(String, String)>,
) {
    match value {
        serde_json::Value::Object(obj) if !obj.is_empty() => {
            for (key, val) in obj {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                collect_settings(val, path, results);
            }
        }
        other => results.push((prefix, display_value(other))),
    }
}

/// Recursively merge `other` into `target`, but only for fields where
/// `other` differs from `defaults`.
fn merge_non_default(
    target: &mut serde_json::Value,
    other: &serde_json::Value,
    defaults: &serde_json::Value,
) {
    match (target, other, defaults) {
        (
            serde_json::Value::Object(t),
            serde_json::Value::Object(o),
            serde_json::Value::Object(d),
        ) => {
            for (key, other_val) in o {
                let default_val = d.get(key).cloned().unwrap_or(serde_json::Value::Null);
                if let Some(target_val) = t.get_mut(key) {
                    merge_non_default(target_val, other_val, &default_val);
                } else if other_val != &default_val {
                    t.insert(key.clone(), other_val.clone());
                }
            }
        }
        (target, other, defaults) => {
            if other != defaults {
                *target = other.clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::settings::*;

    const ADDRESS: &str = "0x0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.lifi.integrator, "slyck");
        assert_eq!(settings.lifi.timeout_ms, 15_000);
        assert_eq!(settings.execution.status_poll_interval_ms, 5_000);
        assert_eq!(settings.execution.status_timeout_secs, 2_400);
        assert_eq!(settings.bridge.auto_deposit_symbols, vec!["USDC", "HYPE"]);
    }

    #[test]
    fn test_get_setting() {
        let settings = Settings::default();
        assert_eq!(settings.get("lifi.timeout_ms"), Some("15000".to_string()));
        assert_eq!(settings.get("lifi.integrator"), Some("slyck".to_string()));
        assert_eq!(settings.get("wallet_address"), Some("null".to_string()));
        assert_eq!(settings.get("nope.nothing"), None);
    }

    #[test]
    fn test_set_setting() {
        let mut settings = Settings::default();
        settings.set("lifi.timeout_ms", "30000").unwrap();
        assert_eq!(settings.lifi.timeout_ms, 30_000);

        settings.set("wallet_address", ADDRESS).unwrap();
        assert_eq!(settings.wallet_address.as_deref(), Some(ADDRESS));

        assert!(settings.set("lifi.timeout_ms", "soon").is_err());
        assert!(settings.set("lifi.unknown_key", "1").is_err());
    }

    #[test]
    fn set_validates_wallet_and_endpoint() {
        let mut settings = Settings::default();
        assert!(settings.set("wallet_address", "0x1234").is_err());
        assert!(settings.set("lifi.api_base_url", "ftp://li.quest").is_err());

        settings
            .set("lifi.api_base_url", "https://staging.li.quest/v1")
            .unwrap();
        assert_eq!(
            settings.lifi.api_base_url.as_deref(),
            Some("https://staging.li.quest/v1")
        );

        settings.set("lifi.api_base_url", "null").unwrap();
        assert!(settings.lifi.api_base_url.is_none());
    }

    #[test]
    fn set_rpc_override_and_symbols() {
        let mut settings = Settings::default();
        settings
            .set("execution.rpc_urls.42161", "https://arb1.arbitrum.io/rpc")
            .unwrap();
        assert_eq!(
            settings.execution.rpc_urls.get("42161").map(String::as_str),
            Some("https://arb1.arbitrum.io/rpc")
        );
        assert!(settings.set("execution.rpc_urls.arb", "https://x").is_err());

        settings.reset("execution.rpc_urls.42161").unwrap();
        assert!(settings.execution.rpc_urls.is_empty());

        settings
            .set("bridge.auto_deposit_symbols", "usdc, hype ,usdt0")
            .unwrap();
        assert_eq!(
            settings.bridge.auto_deposit_symbols,
            vec!["USDC", "HYPE", "USDT0"]
        );
    }

    #[test]
    fn test_reset_setting() {
        let mut settings = Settings::default();
        settings.lifi.timeout_ms = 1;
        settings.reset("lifi.timeout_ms").unwrap();
        assert_eq!(settings.lifi.timeout_ms, 15_000);

        settings.bridge.auto_deposit_symbols.clear();
        settings.reset("bridge.auto_deposit_symbols").unwrap();
        assert_eq!(settings.bridge.auto_deposit_symbols, vec!["USDC", "HYPE"]);
    }

    #[test]
    fn test_list_settings() {
        let settings = Settings::default();
        let list = settings.list();
        let keys: Vec<&str> = list.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"lifi.integrator"));
        assert!(keys.contains(&"execution.status_timeout_secs"));
        assert!(keys.contains(&"execution.rpc_urls"));
        assert!(keys.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.wallet_address = Some(ADDRESS.to_string());
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.wallet_address.as_deref(), Some(ADDRESS));
    }

    #[test]
    fn load_from_garbage_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let loaded = Settings::load_from(&path);
        assert_eq!(loaded.lifi.integrator, "slyck");
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut settings = Settings::default();
        settings.lifi.integrator = "desk".to_string();
        settings.execution.status_poll_interval_ms = 2_000;
        settings
            .execution
            .rpc_urls
            .insert("1".to_string(), "https://eth.llamarpc.com".to_string());

        settings.save_toml(&path).unwrap();
        let loaded = Settings::load_toml(&path).unwrap().unwrap();

        assert_eq!(loaded.lifi.integrator, "desk");
        assert_eq!(loaded.execution.status_poll_interval_ms, 2_000);
        assert_eq!(
            loaded.execution.rpc_urls.get("1").map(String::as_str),
            Some("https://eth.llamarpc.com")
        );
    }

    #[test]
    fn toml_missing_file_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let result = Settings::load_toml(&dir.path().join("absent.toml"));
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn toml_invalid_content_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml [[[").unwrap();

        assert!(Settings::load_toml(&path).is_err());
    }

    #[test]
    fn toml_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[lifi]\nintegrator = \"partial\"\n").unwrap();

        let loaded = Settings::load_toml(&path).unwrap().unwrap();
        assert_eq!(loaded.lifi.integrator, "partial");
        assert_eq!(loaded.lifi.timeout_ms, 15_000);
        assert_eq!(loaded.bridge.auto_deposit_symbols, vec!["USDC", "HYPE"]);
    }

    #[test]
    fn toml_header_comment_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        Settings::default().save_toml(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();

        assert!(content.starts_with("# Slyck configuration file."));
        assert!(content.contains("[lifi]"));
        assert!(content.contains("[execution]"));
    }

    #[test]
    fn merge_only_overrides_non_default_values() {
        let mut base = Settings::default();
        base.lifi.integrator = "from-json".to_string();
        base.execution.status_timeout_secs = 600;

        let mut overlay = Settings::default();
        overlay.lifi.integrator = "from-toml".to_string();

        base.merge_from(&overlay);

        assert_eq!(base.lifi.integrator, "from-toml");
        assert_eq!(base.execution.status_timeout_secs, 600);
    }

    #[test]
    fn default_toml_path_under_slyck_home() {
        let path = Settings::default_toml_path();
        assert!(path.to_string_lossy().contains(".slyck"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
