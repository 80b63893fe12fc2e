//! Configuration management for Threadchat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{Result, ThreadchatError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provider types accepted in `provider.type`
pub const VALID_PROVIDERS: [&str; 2] = ["ollama", "openai"];

/// Main configuration structure for Threadchat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Remote model configuration
    pub provider: ProviderConfig,
    /// Chat shell behavior
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Provider configuration
///
/// Exactly one provider is active per process; the other block is kept so a
/// `--provider` override can switch without editing the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Type of provider to use
    #[serde(rename = "type")]
    pub provider_type: String,

    /// Timeout for a non-streaming model request (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Ollama configuration
    #[serde(default)]
    pub ollama: OllamaConfig,

    /// OpenAI-compatible endpoint configuration
    #[serde(default)]
    pub openai: OpenAiConfig,
}

fn default_timeout() -> u64 {
    120
}

/// Ollama provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    /// Ollama server host
    #[serde(default = "default_ollama_host")]
    pub host: String,

    /// Model to use for Ollama
    #[serde(default = "default_ollama_model")]
    pub model: String,
}

fn default_ollama_host() -> String {
    "http://localhost:11434".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2:latest".to_string()
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: default_ollama_host(),
            model: default_ollama_model(),
        }
    }
}

/// OpenAI-compatible chat completions configuration
///
/// The defaults target Gemini through Google's OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Base URL; `/chat/completions` is appended
    #[serde(default = "default_openai_api_base")]
    pub api_base: String,

    /// Model identifier sent with each request
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Name of the environment variable holding the API key
    ///
    /// An empty name sends requests without an `Authorization` header.
    #[serde(default = "default_openai_api_key_env")]
    pub api_key_env: String,
}

fn default_openai_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_openai_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_openai_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: default_openai_api_base(),
            model: default_openai_model(),
            api_key_env: default_openai_api_key_env(),
        }
    }
}

/// Chat shell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Render replies incrementally as fragments arrive
    #[serde(default = "default_stream")]
    pub stream: bool,

    /// How many messages to print when a thread is shown
    ///
    /// `threads show` prints the first N, the chat shell the most recent N.
    /// `None` prints the whole thread.
    #[serde(default)]
    pub history_limit: Option<usize>,
}

fn default_stream() -> bool {
    true
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            stream: default_stream(),
            history_limit: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default_config()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn default_config() -> Self {
        Self {
            provider: ProviderConfig {
                provider_type: "openai".to_string(),
                timeout_seconds: default_timeout(),
                ollama: OllamaConfig::default(),
                openai: OpenAiConfig::default(),
            },
            chat: ChatConfig::default(),
        }
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ThreadchatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ThreadchatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(provider_type) = std::env::var("THREADCHAT_PROVIDER") {
            self.provider.provider_type = provider_type;
        }

        if let Ok(ollama_host) = std::env::var("THREADCHAT_OLLAMA_HOST") {
            self.provider.ollama.host = ollama_host;
        }

        if let Ok(ollama_model) = std::env::var("THREADCHAT_OLLAMA_MODEL") {
            self.provider.ollama.model = ollama_model;
        }

        if let Ok(api_base) = std::env::var("THREADCHAT_OPENAI_API_BASE") {
            self.provider.openai.api_base = api_base;
        }

        if let Ok(openai_model) = std::env::var("THREADCHAT_OPENAI_MODEL") {
            self.provider.openai.model = openai_model;
        }

        if let Ok(timeout) = std::env::var("THREADCHAT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.provider.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid THREADCHAT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(stream) = std::env::var("THREADCHAT_STREAM") {
            match stream.parse::<bool>() {
                Ok(v) => {
                    self.chat.stream = v;
                    tracing::debug!(stream = v, "Env override: THREADCHAT_STREAM");
                }
                Err(_) => {
                    tracing::warn!("Invalid value for THREADCHAT_STREAM: {}", stream);
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
        if let Some(provider) = cli.provider_override() {
            tracing::debug!("Provider override from CLI: {}", provider);
            self.provider.provider_type = provider.to_string();
        }
        if cli.no_stream_override() {
            self.chat.stream = false;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.provider_type.is_empty() {
            return Err(
                ThreadchatError::Config("Provider type cannot be empty".to_string()).into(),
            );
        }

        if !VALID_PROVIDERS.contains(&self.provider.provider_type.as_str()) {
            return Err(ThreadchatError::Config(format!(
                "Invalid provider type: {}. Must be one of: {}",
                self.provider.provider_type,
                VALID_PROVIDERS.join(", ")
            ))
            .into());
        }

        if self.provider.timeout_seconds == 0 {
            return Err(ThreadchatError::Config(
                "provider.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        let model = match self.provider.provider_type.as_str() {
            "ollama" => &self.provider.ollama.model,
            _ => &self.provider.openai.model,
        };
        if model.trim().is_empty() {
            return Err(ThreadchatError::Config(format!(
                "provider.{}.model cannot be empty",
                self.provider.provider_type
            ))
            .into());
        }

        if self.chat.history_limit == Some(0) {
            return Err(ThreadchatError::Config(
                "chat.history_limit must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
