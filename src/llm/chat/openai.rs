use async_trait::async_trait;
use log::debug;
use reqwest::{ Client as HttpClient, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ ChatClient, CompletionResponse };
use crate::llm::{ GenerationParams, LlmConfig, LlmError };
use crate::models::chat::WireMessage;

/// Client for OpenAI-compatible `chat/completions` endpoints, which includes
/// the Hugging Face inference router.
pub struct OpenAIChatClient {
    http: HttpClient,
    has_api_key: bool,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [WireMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn new(
        api_key: Option<String>,
        model: String,
        base_url: String,
        timeout: std::time::Duration
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        if let Some(key) = &api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", key)).map_err(|e|
                    LlmError::InvalidApiKey(e.to_string())
                )?
            );
        }

        let http = HttpClient::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Http { model: model.clone(), source: e })?;

        Ok(Self {
            http,
            has_api_key: api_key.is_some(),
            model,
            base_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let model = config.completion_model.clone().unwrap_or_else(|| "gpt-4o".to_string());
        let base_url = config.base_url
            .clone()
            .unwrap_or_else(|| config.llm_type.default_base_url().to_string());

        Self::new(config.api_key.clone(), model, base_url, config.timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn chat(
        &self,
        messages: &[WireMessage],
        params: &GenerationParams
    ) -> Result<CompletionResponse, LlmError> {
        if !self.has_api_key {
            return Err(LlmError::MissingApiKey(self.model.clone()));
        }

        let req = OpenAIChatRequest {
            model: &self.model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stream: false,
        };

        let url = self.endpoint();
        debug!("Sending {} messages to {} ({})", messages.len(), url, self.model);
        let resp = self.http
            .post(&url)
            .json(&req)
            .send().await
            .map_err(|e| LlmError::Http { model: self.model.clone(), source: e })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                model: self.model.clone(),
                status: status.as_u16(),
                body,
            });
        }

        let data = resp
            .json::<OpenAIResponse>().await
            .map_err(|e| LlmError::Http { model: self.model.clone(), source: e })?;

        let content = data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::EmptyReply(self.model.clone()))?;

        Ok(CompletionResponse { response: content })
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Role;
    use std::time::Duration;

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let messages = vec![WireMessage::new(Role::System, "be nice"), WireMessage::new(Role::User, "hi")];
        let req = OpenAIChatRequest {
            model: "m",
            messages: &messages,
            max_tokens: 2048,
            temperature: 0.5,
            stream: false,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "m");
        assert_eq!(value["max_tokens"], 2048);
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
    }

    #[test]
    fn response_with_null_content_parses() {
        let data: OpenAIResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#
        ).unwrap();
        assert!(data.choices[0].message.content.is_none());
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let client = OpenAIChatClient::new(
            None,
            "m".into(),
            "https://example.test/v1/".into(),
            Duration::from_secs(1)
        ).unwrap();
        assert_eq!(client.endpoint(), "https://example.test/v1/chat/completions");
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let client = OpenAIChatClient::new(
            Some("  ".into()),
            "m".into(),
            "http://127.0.0.1:9".into(),
            Duration::from_secs(1)
        ).unwrap();
        let err = client
            .chat(&[WireMessage::new(Role::User, "hi")], &GenerationParams::default()).await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingApiKey(model) if model == "m"));
    }
}
