pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use super::{ GenerationParams, LlmConfig, LlmError, LlmType };
use self::ollama::OllamaClient;
use self::openai::OpenAIChatClient;
use crate::models::chat::WireMessage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResponse {
    pub response: String,
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn chat(
        &self,
        messages: &[WireMessage],
        params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::HuggingFace | LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Ollama => {
            let specific_client = OllamaClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Builds one client per model identifier, keeping the given order.
pub fn new_clients(
    base: &LlmConfig,
    models: &[String]
) -> Result<Vec<Arc<dyn ChatClient>>, LlmError> {
    models
        .iter()
        .map(|model| {
            let config = LlmConfig {
                completion_model: Some(model.clone()),
                ..base.clone()
            };
            new_client(&config)
        })
        .collect()
}
