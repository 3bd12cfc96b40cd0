//! # Configuration Module
//!
//! This module defines configuration structures for the external model
//! client and the recovery policy applied to its calls (timeout, retry,
//! image probing).

// Constants for the external model endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.dedaluslabs.ai/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
pub const API_KEY_ENV: &str = "POCKETFRIDGE_API_KEY";

/// Default number of recipes requested per generation call
pub const DEFAULT_RECIPE_COUNT: usize = 4;
/// Number of soonest-expiring items emphasized in the recipe prompt
pub const TOP_EXPIRING_LIMIT: usize = 6;

/// Configuration for the OpenAI-compatible chat-completion endpoint
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Base URL of the provider (OpenAI-compatible API)
    pub base_url: String,
    /// Model identifier in "provider/model" form
    pub model: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: API_KEY_ENV.to_string(),
        }
    }
}

/// Recovery configuration for external calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts after the first failure
    pub max_retries: u32,
    /// Base delay before a retry in milliseconds
    pub base_retry_delay_ms: u64,
    /// Upper bound of the random jitter added to the retry delay
    pub retry_jitter_ms: u64,
    /// Timeout for one model request in seconds
    pub request_timeout_secs: u64,
    /// Timeout for one image reachability probe in seconds
    pub probe_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_retry_delay_ms: 500,
            retry_jitter_ms: 250,
            request_timeout_secs: 30,
            probe_timeout_secs: 5,
        }
    }
}
