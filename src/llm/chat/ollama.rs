use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use super::{ ChatClient, CompletionResponse };
use crate::llm::{ GenerationParams, LlmConfig, LlmError, LlmType };
use crate::models::chat::WireMessage;
use log::debug;

#[derive(Debug)]
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaClient {
    pub fn new(
        base_url: Option<String>,
        completion_model: Option<String>,
        timeout: std::time::Duration
    ) -> Result<Self, LlmError> {
        let model = completion_model.unwrap_or_else(|| "llama3".to_string());
        let url = base_url.unwrap_or_else(|| LlmType::Ollama.default_base_url().into());
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Http { model: model.clone(), source: e })?;

        Ok(Self {
            http,
            base_url: url,
            completion_model: model,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(config.base_url.clone(), config.completion_model.clone(), config.timeout)
    }
}

#[async_trait]
impl ChatClient for OllamaClient {
    async fn chat(
        &self,
        messages: &[WireMessage],
        params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let req = ChatRequest {
            model: &self.completion_model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: params.temperature,
                num_predict: params.max_tokens,
            },
        };
        debug!("Sending {} messages to {} ({})", messages.len(), url, self.completion_model);

        let http_err = |e| LlmError::Http { model: self.completion_model.clone(), source: e };
        let resp = self.http.post(&url).json(&req).send().await.map_err(http_err)?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                model: self.completion_model.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let data = resp.json::<ChatResponse>().await.map_err(http_err)?;
        let message = data.message.ok_or_else(||
            LlmError::EmptyReply(self.completion_model.clone())
        )?;
        Ok(CompletionResponse { response: message.content })
    }

    fn get_model(&self) -> String {
        self.completion_model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
