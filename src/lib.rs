pub mod models;
pub mod server;
pub mod gateway;
pub mod llm;
pub mod cli;
pub mod history;
pub mod client;

use cli::{ Args, Command, ServeArgs };
use gateway::InferenceGateway;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    match args.command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Chat(chat_args) => client::repl::run_chat(&chat_args).await,
    }
}

pub async fn serve(args: ServeArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Gateway Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("Model Chain: {}", args.models.join(" -> "));
    info!("History Window: {}", args.history_window);
    info!("Max Tokens: {}", args.max_tokens);
    info!("Temperature: {}", args.temperature);
    info!("Request Timeout: {}s", args.request_timeout_secs);
    info!("Token Configured: {}", !args.hf_token.trim().is_empty());
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-----------------------------");

    let gateway = Arc::new(InferenceGateway::from_args(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, gateway, args);
    server.run().await?;

    Ok(())
}
