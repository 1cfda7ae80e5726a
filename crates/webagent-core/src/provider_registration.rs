use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;
use webagent_config::{Config, ProviderConfig};
use webagent_providers::{AnthropicProvider, LLMProvider, ScriptedProvider};

/// Build the model backend described by `config.provider`.
pub fn create_provider(config: &Config, working_dir: &Path) -> Result<Box<dyn LLMProvider>> {
    match &config.provider {
        ProviderConfig::Scripted { .. } => {
            let responses = config
                .scripted_responses(working_dir)
                .context("Failed to load scripted responses")?;
            debug!("Using scripted provider with {} responses", responses.len());
            Ok(Box::new(ScriptedProvider::new(responses)))
        }
        ProviderConfig::Anthropic {
            endpoint,
            model,
            api_key_env,
            max_tokens,
            temperature,
        } => {
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("Environment variable {} is not set", api_key_env))?;
            debug!("Using Anthropic provider with model {}", model);
            Ok(Box::new(AnthropicProvider::new(
                endpoint.clone(),
                api_key,
                model.clone(),
                *max_tokens,
                *temperature,
            )?))
        }
    }
}
