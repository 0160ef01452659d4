use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::embedding_client::{DEFAULT_API_URL, DEFAULT_MODEL};

const DEFAULT_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Everything is optional: without an embedding key the service scores
/// keyword-only, without Redis it caches in memory.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub embedding_api_key: Option<String>,
    pub embedding_api_url: String,
    pub embedding_model: String,
    pub embedding_timeout_ms: u64,
    pub redis_url: Option<String>,
    pub embedding_cache_ttl_secs: u64,
    pub embedding_cache_capacity: usize,
    /// Per-operation bound on Redis cache calls; a slower cache reads as a miss.
    pub embedding_cache_timeout_ms: u64,
    /// Overall deadline for semantic skill discovery within one match.
    pub skill_discovery_timeout_ms: u64,
    pub taxonomy_path: Option<PathBuf>,
    pub scoring_config_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Ok(Config {
            port: parse_or(&optional, "PORT", 8080)?,
            rust_log: optional("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            embedding_api_key: optional("EMBEDDING_API_KEY"),
            embedding_api_url: optional("EMBEDDING_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            embedding_model: optional("EMBEDDING_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            embedding_timeout_ms: parse_or(&optional, "EMBEDDING_TIMEOUT_MS", 8000)?,
            redis_url: optional("REDIS_URL"),
            embedding_cache_ttl_secs: parse_or(&optional, "EMBEDDING_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?,
            embedding_cache_capacity: parse_or(&optional, "EMBEDDING_CACHE_CAPACITY", 2048)?,
            embedding_cache_timeout_ms: parse_or(&optional, "EMBEDDING_CACHE_TIMEOUT_MS", 250)?,
            skill_discovery_timeout_ms: parse_or(&optional, "SKILL_DISCOVERY_TIMEOUT_MS", 3000)?,
            taxonomy_path: optional("TAXONOMY_PATH").map(PathBuf::from),
            scoring_config_path: optional("SCORING_CONFIG_PATH").map(PathBuf::from),
        })
    }
}

fn parse_or<T>(optional: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        None => Ok(default),
    }
}
