//! Provider module for Threadchat
//!
//! This module contains the remote model abstraction and its
//! implementations for Ollama and OpenAI-compatible endpoints.

pub mod base;
pub mod ollama;
pub mod openai;
pub mod stream;

pub use base::{CompletionResponse, Message, Provider, Role, TextStream, TokenUsage};
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;

use crate::config::ProviderConfig;
use crate::error::{Result, ThreadchatError};

/// Create a provider instance based on configuration
///
/// # Arguments
///
/// * `provider_type` - Type of provider ("ollama" or "openai")
/// * `config` - Provider configuration
///
/// # Errors
///
/// Returns error if provider type is invalid or initialization fails
///
/// # Examples
///
/// ```
/// use threadchat::config::Config;
/// use threadchat::providers::create_provider;
///
/// let config = Config::default();
/// let provider = create_provider("ollama", &config.provider).unwrap();
/// assert_eq!(provider.model_name(), "llama3.2:latest");
/// ```
pub fn create_provider(provider_type: &str, config: &ProviderConfig) -> Result<Box<dyn Provider>> {
    match provider_type {
        "ollama" => Ok(Box::new(OllamaProvider::new(
            config.ollama.clone(),
            config.timeout_seconds,
        )?)),
        "openai" => Ok(Box::new(OpenAiProvider::new(
            config.openai.clone(),
            config.timeout_seconds,
        )?)),
        _ => Err(ThreadchatError::Config(format!(
            "Unknown provider type: {}",
            provider_type
        ))
        .into()),
    }
}
