//! Configuration for the Parkchat assistant backend.
//!
//! # Configuration Priority
//!
//! 1. Explicit values (deserialized from a config file by the host)
//! 2. Environment variables (PARKCHAT_* prefix)
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `PARKCHAT_SESSION_TTL_SECS` → session.ttl_secs
//! - `PARKCHAT_BUFFER_SIZE` → session.buffer_size
//! - `PARKCHAT_REDIS_URL` → cache.url
//! - `PARKCHAT_CACHE_PREFIX` → cache.key_prefix
//! - `PARKCHAT_AGENT_CACHE_CAPACITY` → agent_cache.capacity
//! - `PARKCHAT_AGENT_CACHE_IDLE_SECS` → agent_cache.idle_ttl_secs
//! - `PARKCHAT_LOG_LEVEL` → logging.level
//! - `PARKCHAT_LOG_FORMAT` → logging.format

use serde::{Deserialize, Serialize};

// ============================================================================
// Session Configuration
// ============================================================================

/// Session and memory-buffer parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Time-to-live for session cache entries and memory buffers, in
    /// seconds. Refreshed on every write (sliding expiration).
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of messages kept in the sliding-window memory
    /// buffer per session.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    3600
}

fn default_buffer_size() -> usize {
    20
}

// ============================================================================
// Cache Store Configuration
// ============================================================================

/// Key-value cache store (Redis) connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Redis URL (redis://host:port).
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Key prefix for namespacing.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_key_prefix() -> String {
    "parkchat:".to_string()
}

// ============================================================================
// Agent Handle Cache Configuration
// ============================================================================

/// In-process agent handle cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCacheConfig {
    /// Maximum number of cached agent handles.
    #[serde(default = "default_agent_cache_capacity")]
    pub capacity: usize,

    /// Idle time-to-live in seconds; entries untouched for longer are
    /// swept on the next lookup.
    #[serde(default = "default_agent_cache_idle_secs")]
    pub idle_ttl_secs: u64,
}

impl Default for AgentCacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_agent_cache_capacity(),
            idle_ttl_secs: default_agent_cache_idle_secs(),
        }
    }
}

fn default_agent_cache_capacity() -> usize {
    50
}

fn default_agent_cache_idle_secs() -> u64 {
    30 * 60
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Logging output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: "json" or "pretty".
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the Parkchat backend.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Session and memory-buffer parameters.
    #[serde(default)]
    pub session: SessionConfig,

    /// Cache store connection.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Agent handle cache bounds.
    #[serde(default)]
    pub agent_cache: AgentCacheConfig,

    /// Logging output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from defaults with environment overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply `PARKCHAT_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Some(ttl) = env_parse::<u64>("PARKCHAT_SESSION_TTL_SECS") {
            self.session.ttl_secs = ttl;
        }
        if let Some(size) = env_parse::<usize>("PARKCHAT_BUFFER_SIZE") {
            self.session.buffer_size = size;
        }
        if let Ok(url) = std::env::var("PARKCHAT_REDIS_URL") {
            self.cache.url = url;
        }
        if let Ok(prefix) = std::env::var("PARKCHAT_CACHE_PREFIX") {
            self.cache.key_prefix = prefix;
        }
        if let Some(cap) = env_parse::<usize>("PARKCHAT_AGENT_CACHE_CAPACITY") {
            self.agent_cache.capacity = cap;
        }
        if let Some(idle) = env_parse::<u64>("PARKCHAT_AGENT_CACHE_IDLE_SECS") {
            self.agent_cache.idle_ttl_secs = idle;
        }
        if let Ok(level) = std::env::var("PARKCHAT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("PARKCHAT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(value) => match value.parse() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                tracing::warn!(var = name, value = %value, "Ignoring unparseable environment override");
                None
            }
        },
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.session.buffer_size, 20);
        assert_eq!(config.agent_cache.capacity, 50);
        assert_eq!(config.agent_cache.idle_ttl_secs, 1800);
        assert_eq!(config.cache.url, "redis://127.0.0.1:6379");
        assert_eq!(config.cache.key_prefix, "parkchat:");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"session": {"buffer_size": 5}}"#).unwrap();
        assert_eq!(config.session.buffer_size, 5);
        // Unspecified fields fall back to defaults
        assert_eq!(config.session.ttl_secs, 3600);
        assert_eq!(config.agent_cache.capacity, 50);
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.session.ttl_secs, config.session.ttl_secs);
        assert_eq!(parsed.cache.key_prefix, config.cache.key_prefix);
    }
}
