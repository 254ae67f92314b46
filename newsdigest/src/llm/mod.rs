use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use common::LlmConfig;

/// Core trait for text completion backends
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    /// Conversation identifier forwarded to the backend
    pub session_id: Option<String>,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod remote;

/// Build the completion provider selected by `llm.adapter`.
///
/// `Ok(None)` when no adapter is configured (or it is `"none"`); summaries then fail
/// with a completion error while the rest of the API keeps working.
pub fn provider_from_config(
    llm_config: Option<&LlmConfig>,
    client: reqwest::Client,
) -> Result<Option<Arc<dyn LlmProvider>>> {
    let Some(llm_config) = llm_config else {
        return Ok(None);
    };

    let adapter = llm_config.adapter.as_deref().unwrap_or("none");
    match adapter {
        "none" => Ok(None),
        "remote" => {
            let remote_config = llm_config
                .remote
                .as_ref()
                .context("Remote adapter selected but no [llm.remote] section found")?;

            // Fetch API key from env var
            let api_key_env = remote_config
                .api_key_env
                .as_deref()
                .context("Missing api_key_env in remote config")?;
            let api_key = std::env::var(api_key_env)
                .with_context(|| format!("LLM API key env var '{}' not set", api_key_env))?;

            let model = remote_config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = remote_config
                .api_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());
            let timeout_secs = remote_config.timeout_seconds.unwrap_or(30);
            let max_tokens = remote_config.max_tokens.unwrap_or(500);

            info!(%model, %api_url, "llm: remote provider initialized");
            let provider: Arc<dyn LlmProvider> = Arc::new(
                remote::RemoteLlmProvider::new(api_url, api_key, model)
                    .with_defaults(timeout_secs, max_tokens, 0.7)
                    .with_client(client),
            );
            Ok(Some(provider))
        }
        _ => anyhow::bail!("Unknown LLM adapter type: {}", adapter),
    }
}
