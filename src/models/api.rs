use serde::{ Serialize, Deserialize };
use super::chat::WireMessage;

/// Body of `POST /api/chat`. A missing `messages` field reads as an empty history.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatReply {
    #[serde(default)]
    pub reply: String,
}

impl ChatReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub models: Vec<String>,
}
