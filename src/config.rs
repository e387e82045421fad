//! Runtime configuration for the coaching service
//!
//! Values come from the environment (optionally seeded by a `.env` file).
//! Every setting has a default, so an empty environment yields a working
//! service that simply never enriches.

use serde::Serialize;
use std::env::{self, VarError};
use std::time::Duration;

/// ---------------------------------------------------------------------------
/// Defaults
/// ---------------------------------------------------------------------------

pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 500;
pub const DEFAULT_LLM_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_LLM_API_URL: &str = "https://api.anthropic.com/v1/messages";

const ENV_CACHE_TTL: &str = "COACH_CACHE_TTL_SECONDS";
const ENV_MAX_CACHE_SIZE: &str = "COACH_MAX_CACHE_SIZE";
const ENV_LLM_TIMEOUT: &str = "COACH_LLM_TIMEOUT_SECONDS";
const ENV_LLM_MODEL: &str = "COACH_LLM_MODEL";
const ENV_LLM_API_URL: &str = "COACH_LLM_API_URL";
const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";

/// ---------------------------------------------------------------------------
/// Error Types
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Invalid value for {name}: {value:?}")]
  Invalid { name: &'static str, value: String },
}

impl Serialize for ConfigError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Coach Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CoachConfig {
  /// How long a cached coaching text stays valid
  pub cache_ttl: Duration,

  /// Entries per cache before cleanup kicks in. Must be at least 1
  pub max_cache_size: usize,

  /// Deadline for a single enrichment call
  pub enrichment_timeout: Duration,

  pub llm_model: String,
  pub llm_api_url: String,

  /// None means enrichment is not configured and every request falls back
  pub api_key: Option<String>,
}

impl Default for CoachConfig {
  fn default() -> Self {
    Self {
      cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS),
      max_cache_size: DEFAULT_MAX_CACHE_SIZE,
      enrichment_timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECONDS),
      llm_model: DEFAULT_LLM_MODEL.to_string(),
      llm_api_url: DEFAULT_LLM_API_URL.to_string(),
      api_key: None,
    }
  }
}

impl CoachConfig {
  /// Load `.env` (if any) and then read the environment
  pub fn load() -> Result<Self, ConfigError> {
    dotenvy::dotenv().ok();
    Self::from_env()
  }

  /// Build configuration from environment variables, falling back to defaults
  pub fn from_env() -> Result<Self, ConfigError> {
    let cache_ttl_secs = parse_var(ENV_CACHE_TTL, DEFAULT_CACHE_TTL_SECONDS)?;
    let max_cache_size = parse_var(ENV_MAX_CACHE_SIZE, DEFAULT_MAX_CACHE_SIZE)?;
    if max_cache_size == 0 {
      return Err(ConfigError::Invalid {
        name: ENV_MAX_CACHE_SIZE,
        value: "0".to_string(),
      });
    }
    let timeout_secs = parse_var(ENV_LLM_TIMEOUT, DEFAULT_LLM_TIMEOUT_SECONDS)?;

    // An empty key is the same as no key
    let api_key = read_var(ENV_API_KEY)?.filter(|k| !k.trim().is_empty());
    let llm_model = read_var(ENV_LLM_MODEL)?.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
    let llm_api_url = read_var(ENV_LLM_API_URL)?.unwrap_or_else(|| DEFAULT_LLM_API_URL.to_string());

    Ok(Self {
      cache_ttl: Duration::from_secs(cache_ttl_secs),
      max_cache_size,
      enrichment_timeout: Duration::from_secs(timeout_secs),
      llm_model,
      llm_api_url,
      api_key,
    })
  }

  pub fn enrichment_configured(&self) -> bool {
    self.api_key.is_some()
  }
}

/// An unset variable is `None`; a non-UTF-8 one is an error
fn read_var(name: &'static str) -> Result<Option<String>, ConfigError> {
  match env::var(name) {
    Ok(raw) => Ok(Some(raw)),
    Err(VarError::NotPresent) => Ok(None),
    Err(VarError::NotUnicode(raw)) => Err(ConfigError::Invalid {
      name,
      value: raw.to_string_lossy().into_owned(),
    }),
  }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
  match read_var(name)? {
    Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
    None => Ok(default),
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
