use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::QqConnectConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "qqconnect.toml",
    "qqconnect.yaml",
    "qqconnect.yml",
    "qqconnect.json",
];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Set a custom config directory. When set, config discovery only looks in
/// this directory (project-local and user-global paths are skipped).
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<QqConnectConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./qqconnect.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/qqconnect/qqconnect.{toml,yaml,yml,json}` (user-global)
///
/// Returns `QqConnectConfig::default()` if no config file is found or it
/// fails to parse.
pub fn discover_and_load() -> QqConnectConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return QqConnectConfig::default();
    };
    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            QqConnectConfig::default()
        },
    }
}

/// [`discover_and_load`] followed by `QQCONNECT_*` environment overrides.
pub fn discover_and_load_with_env() -> QqConnectConfig {
    let mut config = discover_and_load();
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

/// Override individual fields from `QQCONNECT_*` variables, read through `lookup`.
pub fn apply_env_overrides(config: &mut QqConnectConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("QQCONNECT_APP_ID") {
        config.app.app_id = v;
    }
    if let Some(v) = lookup("QQCONNECT_APP_SECRET") {
        config.app.app_secret = Some(Secret::new(v));
    }
    if let Some(v) = lookup("QQCONNECT_REDIRECT_URI") {
        config.app.redirect_uri = Some(v);
    }
    if let Some(v) = lookup("QQCONNECT_TOKEN_URL") {
        config.endpoints.token_url = Some(v);
    }
    if let Some(v) = lookup("QQCONNECT_TOKEN_PATH") {
        config.store.path = Some(PathBuf::from(v));
    }
}

/// Find the first config file in standard locations.
///
/// When a config dir override is set, only that directory is searched.
pub fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }

    // Project-local
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    // User-global: ~/.config/qqconnect/
    home_dir().and_then(|h| first_existing(&h.join(".config").join("qqconnect")))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/qqconnect/` on all platforms.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    home_dir().map(|h| h.join(".config").join("qqconnect"))
}

fn home_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<QqConnectConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
