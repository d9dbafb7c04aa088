//! Optional config from .crestrc or ~/.crestrc (JSON). Merged with env and CLI.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::deadline::Deadline;
use crate::error::CrestError;

/// Optional config from file. CLI and env override these.
#[derive(Default, Clone, Debug)]
pub struct Config {
    pub cache_dir: Option<String>,
    pub plain_http: Option<bool>,
    pub token: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// Load config from .crestrc in dir, then ~/.crestrc. Missing or invalid file = default.
pub fn load_config(dir: &Path) -> Config {
    let mut cfg = Config::default();
    let home = dirs_home();
    let candidates = [
        dir.join(".crestrc"),
        home.map(|h| h.join(".crestrc")).unwrap_or_else(|| dir.join(".none")),
    ];
    for path in &candidates {
        if path.is_file() {
            if let Ok(s) = std::fs::read_to_string(path) {
                if let Ok(v) = serde_json::from_str::<serde_json::Value>(&s) {
                    if let Some(c) = v.get("cacheDir").and_then(|x| x.as_str()) {
                        cfg.cache_dir = Some(c.to_string());
                    }
                    if let Some(p) = v.get("plainHTTP").and_then(|x| x.as_bool()) {
                        cfg.plain_http = Some(p);
                    }
                    if let Some(t) = v.get("token").and_then(|x| x.as_str()) {
                        cfg.token = Some(t.to_string());
                    }
                    if let Some(t) = v.get("timeoutMs").and_then(|x| x.as_u64()) {
                        cfg.timeout_ms = Some(t);
                    }
                }
            }
            break;
        }
    }
    cfg
}

fn dirs_home() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        std::env::var("HOME").ok().map(PathBuf::from)
    }
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE").ok().map(PathBuf::from)
    }
}

/// Best-effort bearer token for registry requests. Env beats config file.
pub fn registry_token(dir: &Path) -> Option<String> {
    if let Ok(v) = std::env::var("CREST_TOKEN") {
        if !v.trim().is_empty() {
            return Some(v);
        }
    }
    load_config(dir).token
}

/// Whether to default to plain HTTP transport (CREST_PLAIN_HTTP=1, else config).
pub fn default_plain_http(dir: &Path) -> bool {
    if let Ok(v) = std::env::var("CREST_PLAIN_HTTP") {
        return v == "1" || v.eq_ignore_ascii_case("true");
    }
    load_config(dir).plain_http.unwrap_or(false)
}

/// Deadline for one command invocation (CREST_TIMEOUT_MS, else config, else none).
pub fn command_deadline(dir: &Path) -> Deadline {
    let ms = std::env::var("CREST_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .or_else(|| load_config(dir).timeout_ms);
    match ms {
        Some(ms) if ms > 0 => Deadline::after(Duration::from_millis(ms)),
        _ => Deadline::none(),
    }
}

/// Validated options for one push invocation, materialized from CLI flags
/// before any remote call is made.
#[derive(Clone, Debug, Default)]
pub struct PushOptions {
    /// Explicit signature payload paths; empty means cache-derived selection.
    pub signature_paths: Vec<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub plain_http: bool,
}

impl PushOptions {
    /// Validate once, up front. Basic auth needs both halves.
    pub fn validate(&self) -> Result<(), CrestError> {
        match (&self.username, &self.password) {
            (Some(_), None) => Err(CrestError::Config {
                field: "username".to_string(),
                source: "username given without password".to_string(),
            }),
            (None, Some(_)) => Err(CrestError::Config {
                field: "password".to_string(),
                source: "password given without username".to_string(),
            }),
            _ => Ok(()),
        }
    }
}
