use crate::config::Config;
use crate::providers::{OllamaProvider, OpenAIProvider};
use crate::traits::Provider;
use anyhow::{Result, anyhow};
use std::sync::Arc;

pub const OPENAI_KEY_VARS: &[&str] = &["OPENAI_API_KEY", "TROUPE_OPENAI_API_KEY"];

pub fn create_provider(config: &Config) -> Result<Arc<dyn Provider>> {
    let provider_name = config.provider.as_deref().unwrap_or("openai");

    match provider_name.to_lowercase().as_str() {
        "ollama" => {
            let mut provider = OllamaProvider::new();
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        "openai" => {
            let api_key = resolve_api_key(OPENAI_KEY_VARS, &config.api_key)?;
            let mut provider = OpenAIProvider::new(api_key);
            if let Some(base_url) = &config.base_url {
                provider = provider.with_base_url(base_url.clone());
            }
            Ok(Arc::new(provider))
        }
        _ => Err(anyhow!(
            "Unknown provider: {}. Available: openai, ollama",
            provider_name
        )),
    }
}

/// Environment variables win over the key stored in the config file.
fn resolve_api_key(env_vars: &[&str], config_key: &str) -> Result<String> {
    resolve_api_key_with(env_vars, config_key, |name| std::env::var(name).ok())
}

fn resolve_api_key_with(
    env_vars: &[&str],
    config_key: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String> {
    env_vars
        .iter()
        .filter_map(|name| lookup(name))
        .find(|key| !key.trim().is_empty())
        .or_else(|| (!config_key.is_empty()).then(|| config_key.to_string()))
        .ok_or_else(|| {
            anyhow!(
                "No API key found. Set {} or run 'troupe onboard'.",
                env_vars.join(" or ")
            )
        })
}
