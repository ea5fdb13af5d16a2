use std::env;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
const DEFAULT_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Response cache settings, read once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: DEFAULT_TTL_SECONDS,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `CACHE_TTL_SECONDS` wins over the older `CACHE_TTL_HOURS`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = lookup("CACHE_ENABLED")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(true);

        let ttl_seconds = match lookup("CACHE_TTL_SECONDS") {
            Some(raw) => parse_or("CACHE_TTL_SECONDS", &raw, DEFAULT_TTL_SECONDS),
            None => lookup("CACHE_TTL_HOURS")
                .map(|raw| parse_or::<u64>("CACHE_TTL_HOURS", &raw, 24).saturating_mul(3600))
                .unwrap_or(DEFAULT_TTL_SECONDS),
        };

        Self {
            enabled,
            ttl_seconds,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub model: String,
    pub max_output_tokens: u64,
    pub web_search_enabled: bool,
    pub search_max_results: usize,
    pub cache: CacheConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: lookup("PORT")
                .map(|raw| parse_or("PORT", &raw, 8080))
                .unwrap_or(8080),
            log_level: lookup("RUST_LOG")
                .unwrap_or_else(|| "beacon_svc=info,tower_http=debug".to_string()),
            model: lookup("LLM_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_output_tokens: lookup("MAX_OUTPUT_TOKENS")
                .map(|raw| parse_or("MAX_OUTPUT_TOKENS", &raw, 1024))
                .unwrap_or(1024),
            web_search_enabled: lookup("WEB_SEARCH_ENABLED")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(true),
            search_max_results: lookup("SEARCH_MAX_RESULTS")
                .map(|raw| parse_or("SEARCH_MAX_RESULTS", &raw, 5))
                .unwrap_or(5),
            cache: CacheConfig::from_lookup(&lookup),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_or<T: FromStr + Copy + std::fmt::Display>(name: &str, raw: &str, default: T) -> T {
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("{} must be a valid number, got {:?}; using {}", name, raw, default);
        default
    })
}
