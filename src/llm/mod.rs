pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    HuggingFace,
    OpenAI,
    Ollama,
}

impl LlmType {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmType::HuggingFace => "https://router.huggingface.co/v1",
            LlmType::OpenAI => "https://api.openai.com/v1",
            LlmType::Ollama => "http://localhost:11434",
        }
    }
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::HuggingFace => write!(f, "huggingface"),
            LlmType::OpenAI => write!(f, "openai"),
            LlmType::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "huggingface" | "hf" => Ok(LlmType::HuggingFace),
            "openai" => Ok(LlmType::OpenAI),
            "ollama" => Ok(LlmType::Ollama),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::HuggingFace,
            api_key: None,
            completion_model: None,
            base_url: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Sampling settings sent with every generation request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no API key configured for model '{0}'")]
    MissingApiKey(String),
    #[error("invalid API key format: {0}")]
    InvalidApiKey(String),
    #[error("request to model '{model}' failed: {source}")]
    Http {
        model: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("model '{model}' returned HTTP {status}: {body}")]
    Status {
        model: String,
        status: u16,
        body: String,
    },
    #[error("model '{0}' returned an empty reply")]
    EmptyReply(String),
    #[error("model '{0}' panicked while generating")]
    Panicked(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_llm_types_case_insensitively() {
        assert_eq!("HuggingFace".parse::<LlmType>(), Ok(LlmType::HuggingFace));
        assert_eq!("hf".parse::<LlmType>(), Ok(LlmType::HuggingFace));
        assert_eq!("OLLAMA".parse::<LlmType>(), Ok(LlmType::Ollama));
        assert!("groq".parse::<LlmType>().is_err());
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for llm_type in [LlmType::HuggingFace, LlmType::OpenAI, LlmType::Ollama] {
            assert_eq!(llm_type.to_string().parse::<LlmType>(), Ok(llm_type));
        }
    }
}
