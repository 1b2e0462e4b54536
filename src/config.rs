//! Engine endpoint resolution
//!
//! The engine host is resolved from, in order: the `--host` flag, the
//! `STEVEDORE_HOST` environment variable, `DOCKER_HOST` (with `tcp://`
//! rewritten to `http://`), the config file, and finally the default
//! local endpoint.

use std::path::PathBuf;

use serde::Deserialize;
use url::Url;

use stevedore_core::prelude::*;

/// Fallback engine endpoint.
pub const DEFAULT_HOST: &str = "http://localhost:2375";

/// Settings read from `~/.config/stevedore/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    pub host: Option<String>,
    pub api_version: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Path of the user config file, if a config directory exists.
pub fn settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stevedore").join("config.toml"))
}

/// Load the user settings. A missing file is simply empty settings; a
/// malformed file is a configuration error.
pub fn load_settings() -> Result<Settings> {
    let Some(path) = settings_path() else {
        return Ok(Settings::default());
    };
    load_settings_from(&path)
}

pub fn load_settings_from(path: &std::path::Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let raw = std::fs::read_to_string(path)?;
    toml::from_str(&raw).map_err(|e| Error::config(format!("invalid {}: {e}", path.display())))
}

/// Resolve the engine base URL.
pub fn resolve_host(flag: Option<&str>, settings: &Settings) -> Result<Url> {
    let raw = flag
        .map(String::from)
        .or_else(|| std::env::var("STEVEDORE_HOST").ok())
        .or_else(|| std::env::var("DOCKER_HOST").ok().map(rewrite_docker_host))
        .or_else(|| settings.host.clone())
        .unwrap_or_else(|| DEFAULT_HOST.to_string());

    Url::parse(&raw).map_err(|e| Error::config(format!("invalid engine host '{raw}': {e}")))
}

/// `DOCKER_HOST` conventionally uses a `tcp://` scheme for what is plain
/// HTTP on the engine side.
fn rewrite_docker_host(host: String) -> String {
    match host.strip_prefix("tcp://") {
        Some(rest) => format!("http://{rest}"),
        None => host,
    }
}
