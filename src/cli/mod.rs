use clap::{ Parser, Subcommand };
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the inference gateway HTTP server
    Serve(ServeArgs),
    /// Chat with a running gateway from the terminal
    Chat(ChatArgs),
}

impl Command {
    /// Log filter used when RUST_LOG is not set.
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Command::Serve(_) => "info",
            Command::Chat(_) => "warn",
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Host address and port for the server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (huggingface, openai, ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "huggingface")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., https://router.huggingface.co/v1)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// Access token for the inference provider. Calls fail over to the next model when unset.
    #[arg(long, env = "HF_TOKEN", default_value = "", hide_env_values = true)]
    pub hf_token: String,

    /// Ordered, comma-separated list of models to try.
    #[arg(
        long,
        env = "CHAT_MODELS",
        value_delimiter = ',',
        default_value = "Qwen/Qwen2.5-72B-Instruct,meta-llama/Meta-Llama-3-8B-Instruct,mistralai/Mixtral-8x7B-Instruct-v0.1,google/gemma-1.1-7b-it"
    )]
    pub models: Vec<String>,

    /// System instruction prepended to every generation request.
    #[arg(long, env = "SYSTEM_PROMPT", default_value = crate::gateway::DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Number of most recent messages forwarded to the model.
    #[arg(long, env = "HISTORY_WINDOW", default_value = "6")]
    pub history_window: usize,

    /// Upper bound on generated tokens per reply.
    #[arg(long, env = "MAX_TOKENS", default_value = "2048")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[arg(long, env = "TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Per-model request timeout in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value = "60")]
    pub request_timeout_secs: u64,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ChatArgs {
    /// Base URL of the inference gateway.
    #[arg(long, env = "GATEWAY_URL", default_value = "http://127.0.0.1:4000")]
    pub gateway_url: String,

    /// Directory holding the saved conversations. Defaults to the platform data directory.
    #[arg(long, env = "STORE_DIR")]
    pub store_dir: Option<PathBuf>,

    /// Keep conversations in memory only.
    #[arg(long, default_value = "false")]
    pub ephemeral: bool,
}

impl ChatArgs {
    pub fn resolve_store_dir(&self) -> PathBuf {
        if let Some(dir) = &self.store_dir {
            return dir.clone();
        }
        directories::ProjectDirs
            ::from("", "", "nova-chat")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".nova-chat"))
    }
}
