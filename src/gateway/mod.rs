pub mod fallback;

use crate::cli::ServeArgs;
use crate::llm::chat::{ ChatClient, new_clients };
use crate::llm::{ GenerationParams, LlmConfig, LlmError, LlmType };
use crate::models::api::{ ChatReply, ChatRequest };
use crate::models::chat::{ Role, WireMessage };
use self::fallback::FallbackChain;

use futures::FutureExt;
use log::{ error, info, warn };
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Nova AI, a helpful and knowledgeable AI assistant. Give concise, clear, and accurate responses. Be conversational.";

pub const EMPTY_CONVERSATION_REPLY: &str = "Please send a message to start.";

pub const MODELS_BUSY_REPLY: &str =
    "The free AI models are currently warming up or busy. This usually takes 20-30 seconds on first use. Please try sending your message again in a moment!";

pub const GENERIC_FAILURE_REPLY: &str = "Something went wrong. Please try again.";

const HISTORY_FOR_PROMPT_LEN: usize = 6;

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub system_prompt: String,
    pub history_window: usize,
    pub params: GenerationParams,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            history_window: HISTORY_FOR_PROMPT_LEN,
            params: GenerationParams::default(),
        }
    }
}

/// Turns a conversation into exactly one reply string. Backend failures fall
/// through the model chain; nothing here returns an error to the caller.
pub struct InferenceGateway {
    chain: FallbackChain<Arc<dyn ChatClient>>,
    settings: GatewaySettings,
}

impl InferenceGateway {
    pub fn new(clients: Vec<Arc<dyn ChatClient>>, settings: GatewaySettings) -> Self {
        Self {
            chain: FallbackChain::new(clients),
            settings,
        }
    }

    pub fn from_args(args: &ServeArgs) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let llm_type: LlmType = args.chat_llm_type
            .parse()
            .map_err(|e| format!("Invalid chat LLM type: {}", e))?;
        let api_key = Some(args.hf_token.clone()).filter(|k| !k.trim().is_empty());
        if api_key.is_none() && llm_type != LlmType::Ollama {
            warn!("No inference token configured (HF_TOKEN). Requests will fall through to the busy reply.");
        }

        let base = LlmConfig {
            llm_type,
            api_key,
            completion_model: None,
            base_url: args.chat_base_url.clone(),
            timeout: Duration::from_secs(args.request_timeout_secs),
        };
        let models: Vec<String> = args.models
            .iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if models.is_empty() {
            return Err("At least one model must be configured (--models / CHAT_MODELS)".into());
        }
        let clients = new_clients(&base, &models)?;

        let settings = GatewaySettings {
            system_prompt: args.system_prompt.clone(),
            history_window: args.history_window,
            params: GenerationParams {
                max_tokens: args.max_tokens,
                temperature: args.temperature,
            },
        };
        Ok(Self::new(clients, settings))
    }

    pub fn models(&self) -> Vec<String> {
        self.chain
            .providers()
            .iter()
            .map(|c| c.get_model())
            .collect()
    }

    pub async fn reply(&self, history: &[WireMessage]) -> String {
        if history.is_empty() {
            return EMPTY_CONVERSATION_REPLY.to_string();
        }

        let outbound = build_outbound(
            &self.settings.system_prompt,
            history,
            self.settings.history_window
        );
        let params = self.settings.params;

        let outcome = self.chain.run(|client| {
            let outbound = &outbound;
            async move {
                let model = client.get_model();
                let completion = match
                    AssertUnwindSafe(client.chat(outbound, &params)).catch_unwind().await
                {
                    Ok(result) => result?,
                    Err(_) => {
                        return Err(LlmError::Panicked(model));
                    }
                };
                let text = completion.response.trim();
                if text.is_empty() {
                    return Err(LlmError::EmptyReply(model));
                }
                Ok::<_, LlmError>((model, text.to_string()))
            }
        }).await;

        match outcome {
            Some(success) => {
                let (model, text) = success.value;
                info!("Reply generated by {} (attempt {})", model, success.index + 1);
                text
            }
            None if self.chain.is_empty() => {
                warn!("No models configured; returning the busy reply");
                MODELS_BUSY_REPLY.to_string()
            }
            None => {
                warn!("All {} models failed or returned empty replies", self.chain.len());
                MODELS_BUSY_REPLY.to_string()
            }
        }
    }

    /// Handles a raw request body. Malformed input and panics outside a
    /// single model attempt both become the generic failure reply.
    pub async fn respond(&self, body: &[u8]) -> ChatReply {
        let request: ChatRequest = match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                error!("Chat API error: malformed request body: {}", e);
                return ChatReply::new(GENERIC_FAILURE_REPLY);
            }
        };

        match AssertUnwindSafe(self.reply(&request.messages)).catch_unwind().await {
            Ok(reply) => ChatReply::new(reply),
            Err(_) => {
                error!("Chat API error: generation panicked");
                ChatReply::new(GENERIC_FAILURE_REPLY)
            }
        }
    }
}

/// System instruction followed by the last `window` messages of `history`.
pub fn build_outbound(system_prompt: &str, history: &[WireMessage], window: usize) -> Vec<WireMessage> {
    let start = history.len().saturating_sub(window);
    let mut outbound = Vec::with_capacity(history.len() - start + 1);
    outbound.push(WireMessage::new(Role::System, system_prompt));
    outbound.extend_from_slice(&history[start..]);
    outbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Script {
        Fail,
        Reply(&'static str),
        Panic,
    }

    struct ScriptedClient {
        model: String,
        script: Script,
        calls: Arc<Mutex<Vec<(String, Vec<WireMessage>)>>>,
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn chat(
            &self,
            messages: &[WireMessage],
            _params: &GenerationParams
        ) -> Result<CompletionResponse, LlmError> {
            self.calls.lock().unwrap().push((self.model.clone(), messages.to_vec()));
            match self.script {
                Script::Fail =>
                    Err(LlmError::Status {
                        model: self.model.clone(),
                        status: 503,
                        body: "loading".into(),
                    }),
                Script::Reply(text) => Ok(CompletionResponse { response: text.to_string() }),
                Script::Panic => panic!("backend exploded"),
            }
        }

        fn get_model(&self) -> String {
            self.model.clone()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    type CallLog = Arc<Mutex<Vec<(String, Vec<WireMessage>)>>>;

    fn gateway(scripts: Vec<Script>) -> (InferenceGateway, CallLog) {
        let calls: CallLog = Arc::new(Mutex::new(Vec::new()));
        let clients = scripts
            .into_iter()
            .enumerate()
            .map(|(i, script)| {
                Arc::new(ScriptedClient {
                    model: format!("model-{}", i + 1),
                    script,
                    calls: Arc::clone(&calls),
                }) as Arc<dyn ChatClient>
            })
            .collect();
        (InferenceGateway::new(clients, GatewaySettings::default()), calls)
    }

    fn called_models(calls: &CallLog) -> Vec<String> {
        calls.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    fn history(n: usize) -> Vec<WireMessage> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                WireMessage::new(role, format!("message {}", i))
            })
            .collect()
    }

    #[tokio::test]
    async fn empty_history_short_circuits_without_calls() {
        let (gateway, calls) = gateway(vec![Script::Reply("unused")]);
        assert_eq!(gateway.reply(&[]).await, EMPTY_CONVERSATION_REPLY);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn forwards_system_prompt_and_last_six_messages() {
        let (gateway, calls) = gateway(vec![Script::Reply("ok")]);
        let input = history(10);
        gateway.reply(&input).await;

        let calls = calls.lock().unwrap();
        let sent = &calls[0].1;
        assert_eq!(sent.len(), 7);
        assert_eq!(sent[0], WireMessage::new(Role::System, DEFAULT_SYSTEM_PROMPT));
        assert_eq!(&sent[1..], &input[4..]);
    }

    #[tokio::test]
    async fn short_history_is_forwarded_whole() {
        let (gateway, calls) = gateway(vec![Script::Reply("ok")]);
        gateway.reply(&history(3)).await;
        assert_eq!(calls.lock().unwrap()[0].1.len(), 4);
    }

    #[tokio::test]
    async fn later_model_wins_after_failures_and_stops_the_chain() {
        let (gateway, calls) = gateway(vec![
            Script::Fail,
            Script::Reply("   "),
            Script::Reply("  third time lucky \n"),
            Script::Reply("never asked"),
        ]);
        let reply = gateway.reply(&history(1)).await;
        assert_eq!(reply, "third time lucky");
        assert_eq!(called_models(&calls), vec!["model-1", "model-2", "model-3"]);
    }

    #[tokio::test]
    async fn exhausted_chain_returns_busy_reply() {
        let (gateway, calls) = gateway(vec![
            Script::Fail,
            Script::Reply(""),
            Script::Fail,
            Script::Reply("\n\t"),
        ]);
        assert_eq!(gateway.reply(&history(2)).await, MODELS_BUSY_REPLY);
        assert_eq!(calls.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn malformed_body_yields_generic_failure() {
        let (gateway, calls) = gateway(vec![Script::Reply("unused")]);
        assert_eq!(gateway.respond(b"{not json").await.reply, GENERIC_FAILURE_REPLY);
        let bad_role = br#"{"messages":[{"role":"wizard","content":"hi"}]}"#;
        assert_eq!(gateway.respond(bad_role).await.reply, GENERIC_FAILURE_REPLY);
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_messages_field_reads_as_empty() {
        let (gateway, _) = gateway(vec![Script::Reply("unused")]);
        assert_eq!(gateway.respond(b"{}").await.reply, EMPTY_CONVERSATION_REPLY);
    }

    #[tokio::test]
    async fn panicking_backend_falls_through_to_next_model() {
        let (gateway, calls) = gateway(vec![Script::Panic, Script::Reply("fine")]);
        let body = br#"{"messages":[{"role":"user","content":"hi","id":"x"}]}"#;
        assert_eq!(gateway.respond(body).await.reply, "fine");
        assert_eq!(called_models(&calls), vec!["model-1", "model-2"]);
    }

    #[tokio::test]
    async fn every_backend_panicking_gives_busy_reply() {
        let (gateway, _) = gateway(vec![Script::Panic, Script::Panic]);
        assert_eq!(gateway.reply(&history(1)).await, MODELS_BUSY_REPLY);
    }

    #[tokio::test]
    async fn gateway_without_models_is_busy() {
        let (gateway, _) = gateway(Vec::new());
        assert_eq!(gateway.reply(&history(1)).await, MODELS_BUSY_REPLY);
    }

    #[test]
    fn build_outbound_respects_custom_window() {
        let out = build_outbound("sys", &history(5), 2);
        assert_eq!(out.len(), 3);
        assert_eq!(out[1].content, "message 3");
        assert_eq!(out[2].content, "message 4");
    }

    #[test]
    fn models_are_listed_in_chain_order() {
        let (gateway, _) = gateway(vec![Script::Fail, Script::Fail]);
        assert_eq!(gateway.models(), vec!["model-1", "model-2"]);
    }
}
