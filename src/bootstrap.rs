//! Bootstrap env file for Slyck.
//!
//! Secrets such as `LIFI_API_KEY` never go into `settings.json`. They are
//! persisted to `~/.slyck/.env` and picked up through dotenvy on startup.

use std::path::{Path, PathBuf};

/// Path to the Slyck-specific `.env` file: `~/.slyck/.env`.
pub fn slyck_env_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".slyck")
        .join(".env")
}

/// Load env vars from `~/.slyck/.env` (in addition to the standard `.env`).
///
/// Call this **after** `dotenvy::dotenv()`. dotenvy never overwrites existing
/// env vars, so the effective priority is:
///
///   explicit env vars > `./.env` > `~/.slyck/.env`
pub fn load_slyck_env() {
    let path = slyck_env_path();
    if path.exists()
        && let Err(e) = dotenvy::from_path(&path)
    {
        tracing::warn!("Failed to load {}: {}", path.display(), e);
    }
}

/// Upsert vars into `~/.slyck/.env`, keeping unrelated entries.
pub fn save_bootstrap_env(vars: &[(&str, &str)]) -> std::io::Result<()> {
    write_env_file(&slyck_env_path(), vars)
}

fn write_env_file(path: &Path, vars: &[(&str, &str)]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut entries: Vec<(String, String)> = if path.exists() {
        dotenvy::from_path_iter(path)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?
            .filter_map(|r| r.ok())
            .collect()
    } else {
        Vec::new()
    };

    for (key, value) in vars {
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => entries.push((key.to_string(), value.to_string())),
        }
    }

    let mut content = String::new();
    for (key, value) in &entries {
        // Escape backslashes and double quotes so a value can't break out of
        // its quotes and define another var.
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        content.push_str(&format!("{}=\"{}\"\n", key, escaped));
    }
    std::fs::write(path, content)
}
