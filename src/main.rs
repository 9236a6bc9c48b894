use clap::Parser;
use dotenv::dotenv;
use nova_chat::cli::Args;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    dotenv().ok();
    let args = Args::parse();
    env_logger::Builder
        ::from_env(env_logger::Env::default().default_filter_or(args.command.default_log_filter()))
        .init();

    nova_chat::run(args).await
}
