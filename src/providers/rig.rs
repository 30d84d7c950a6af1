//! rig-core integration for LLM-backed critique.
//!
//! Uses rig-core's provider clients and Agent abstraction for multi-provider
//! support. Currently supports: Anthropic, OpenAI, Cohere, Gemini, Perplexity,
//! DeepSeek, xAI, Groq, and any OpenAI-compatible API.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers;

use crate::config::ProviderConfig;
use crate::models::ProviderName;
use crate::workers::reply::WorkerReply;

use super::{GenerationError, GenerationProvider, GenerationRequest};

/// Maximum tokens per completion response.
///
/// Thinking models spend part of the budget on reasoning tokens, so this
/// is set well above what a suggestion list needs.
const MAX_TOKENS: u64 = 16384;

/// Build an agent from a rig-core client and prompt it once.
///
/// Always sets `max_tokens`; without it some providers (e.g. Gemini)
/// default to a low limit that truncates responses.
macro_rules! prompt_simple {
    ($client:expr, $req:expr, $label:expr) => {{
        let agent = $client
            .agent($req.model)
            .preamble($req.system)
            .temperature($req.temperature)
            .max_tokens(MAX_TOKENS)
            .output_schema::<WorkerReply>()
            .build();
        agent
            .prompt($req.user)
            .await
            .map_err(|e| GenerationError::Api(format!("{} API error: {e}", $label)))
    }};
}

/// Create a rig-core client using the `Client::new(api_key)` convention.
macro_rules! new_client {
    ($provider_mod:path, $api_key:expr, $label:expr) => {{
        <$provider_mod>::new($api_key).map_err(|e| {
            GenerationError::Api(format!("failed to create {} client: {e}", $label))
        })
    }};
}

/// rig-core based generation provider.
///
/// The provider name in config selects which rig-core client is built.
pub struct RigProvider {
    config: ProviderConfig,
}

impl RigProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, GenerationError> {
        if config.api_key.is_none() {
            return Err(GenerationError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.name,
                crate::constants::ENV_API_KEY,
                config.name.api_key_env_var()
            )));
        }
        if config.name == ProviderName::OpenAICompatible && config.base_url.is_none() {
            return Err(GenerationError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            ));
        }
        Ok(Self { config })
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| GenerationError::NotConfigured("missing API key".to_string()))
    }

    /// OpenAI-style client, with the configured base URL if any.
    fn build_openai_client(
        &self,
        api_key: &str,
        label: &str,
    ) -> Result<providers::openai::CompletionsClient, GenerationError> {
        let mut builder = providers::openai::CompletionsClient::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        builder
            .build()
            .map_err(|e| GenerationError::Api(format!("failed to create {label} client: {e}")))
    }
}

#[async_trait]
impl GenerationProvider for RigProvider {
    async fn generate(&self, req: &GenerationRequest<'_>) -> Result<String, GenerationError> {
        let api_key = self.api_key()?;

        match self.config.name {
            ProviderName::Anthropic => {
                let client: providers::anthropic::Client = providers::anthropic::Client::builder()
                    .api_key(api_key)
                    .build()
                    .map_err(|e| {
                        GenerationError::Api(format!("failed to create Anthropic client: {e}"))
                    })?;
                prompt_simple!(client, req, "Anthropic")
            }
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key, "OpenAI")?;
                prompt_simple!(client, req, "OpenAI")
            }
            ProviderName::OpenAICompatible => {
                let client = self.build_openai_client(api_key, "OpenAI-compatible")?;
                prompt_simple!(client, req, "OpenAI-compatible")
            }
            ProviderName::Cohere => {
                let client = new_client!(providers::cohere::Client, api_key, "Cohere")?;
                prompt_simple!(client, req, "Cohere")
            }
            ProviderName::Gemini => {
                let client = new_client!(providers::gemini::Client, api_key, "Gemini")?;
                prompt_simple!(client, req, "Gemini")
            }
            ProviderName::Perplexity => {
                let client = new_client!(providers::perplexity::Client, api_key, "Perplexity")?;
                prompt_simple!(client, req, "Perplexity")
            }
            ProviderName::DeepSeek => {
                let client = new_client!(providers::deepseek::Client, api_key, "DeepSeek")?;
                prompt_simple!(client, req, "DeepSeek")
            }
            ProviderName::XAI => {
                let client = new_client!(providers::xai::Client, api_key, "xAI")?;
                prompt_simple!(client, req, "xAI")
            }
            ProviderName::Groq => {
                let client = new_client!(providers::groq::Client, api_key, "Groq")?;
                prompt_simple!(client, req, "Groq")
            }
        }
    }
}
