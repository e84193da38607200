// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : sol_insight_gateway — rate-limited AI analysis gateway in Rust
Module  : config.rs
Version : 0.5.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
License : MIT (see LICENSE)

Summary : Serves portfolio / market / trading analysis for a Solana
          dashboard over HTTP, calls an LLM chat endpoint through a
          sliding-window quota gate, validates replies against fixed
          schemas and falls back to deterministic answers. Exposes
          Prometheus metrics and records JSONL events.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "mistral-large-latest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("MISTRAL_API_KEY environment variable is not set")]
    MissingApiKey,
    #[error("MISTRAL_API_URL is not a valid URL: {0}")]
    InvalidUrl(String),
    #[error("LISTEN_ADDR is not a valid socket address: {0}")]
    InvalidListenAddr(String),
}

#[derive(Clone, Debug)]
pub struct Args {
    // upstream LLM
    pub api_url: Url,
    pub api_key: String,
    pub model: String,
    pub upstream_timeout: Duration,

    // quota gate
    pub quota_requests: usize,
    pub quota_window: Duration,
    pub quota_wait_timeout: Duration,

    // http / files
    pub listen_addr: SocketAddr,
    pub record_file: Option<String>,
    pub tag_source: bool,
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(raw: Option<String>) -> bool {
    matches!(
        raw.unwrap_or_default().trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Build `Args` from any key lookup (env in production, a map in tests).
pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Args, ConfigError> {
    // ===== Upstream =====
    let api_key = get("MISTRAL_API_KEY")
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(ConfigError::MissingApiKey)?;

    let raw_url = get("MISTRAL_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api_url = Url::parse(raw_url.trim()).map_err(|_| ConfigError::InvalidUrl(raw_url.clone()))?;

    let model = get("MISTRAL_MODEL")
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let upstream_timeout = Duration::from_millis(parse_or(get("UPSTREAM_TIMEOUT_MS"), 30_000u64));

    // ===== Quota =====
    // Contoh: QUOTA_REQUESTS=10, QUOTA_WINDOW_MS=60000 (10 request / menit)
    let quota_requests = parse_or(get("QUOTA_REQUESTS"), 10usize).max(1);
    let quota_window = Duration::from_millis(parse_or(get("QUOTA_WINDOW_MS"), 60_000u64));
    let quota_wait_timeout = Duration::from_millis(parse_or(get("QUOTA_WAIT_TIMEOUT_MS"), 120_000u64));

    // ===== HTTP / journal =====
    let raw_listen = get("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string());
    let listen_addr = raw_listen
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidListenAddr(raw_listen.clone()))?;
    let record_file = get("RECORD_FILE").filter(|p| !p.trim().is_empty());
    let tag_source = parse_bool(get("TAG_SOURCE"));

    Ok(Args {
        api_url,
        api_key,
        model,
        upstream_timeout,
        quota_requests,
        quota_window,
        quota_wait_timeout,
        listen_addr,
        record_file,
        tag_source,
    })
}

pub fn load() -> Result<Args, ConfigError> {
    // Pastikan .env dibaca (agar MISTRAL_API_KEY, QUOTA_*, dll ter-load)
    let _ = dotenv();
    from_lookup(|k| env::var(k).ok())
}
