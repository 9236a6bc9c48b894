pub mod repl;

use log::debug;
use reqwest::Client as HttpClient;
use thiserror::Error;
use url::Url;

use crate::models::api::{ ChatReply, ChatRequest };
use crate::models::chat::WireMessage;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid gateway URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("gateway request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// HTTP client for the gateway's `POST /api/chat`.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: HttpClient,
    endpoint: Url,
}

impl GatewayClient {
    pub fn new(gateway_url: &str) -> Result<Self, ClientError> {
        let invalid = |source| ClientError::InvalidUrl { url: gateway_url.to_string(), source };
        let base = Url::parse(gateway_url).map_err(invalid)?;
        let endpoint = base.join("/api/chat").map_err(invalid)?;
        Ok(Self {
            http: HttpClient::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn request_reply(&self, messages: Vec<WireMessage>) -> Result<String, ClientError> {
        debug!("Posting {} messages to {}", messages.len(), self.endpoint);
        let reply = self.http
            .post(self.endpoint.clone())
            .json(&ChatRequest { messages })
            .send().await?
            .error_for_status()?
            .json::<ChatReply>().await?;
        Ok(reply.reply)
    }
}
