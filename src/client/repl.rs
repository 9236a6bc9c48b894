use crate::cli::ChatArgs;
use crate::history::state::{ ChatState, ReplyOutcome };
use crate::history::storage::{ FileStorage, KeyValueStorage, MemoryStorage };
use crate::history::ConversationStore;
use crate::models::chat::{ ChatMessage, Conversation, Role };
use super::GatewayClient;

use log::{ debug, info, warn };
use std::error::Error;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader };
use tokio::sync::mpsc;

pub const SUGGESTIONS: [&str; 4] = [
    "Explain quantum computing",
    "Write a haiku about space",
    "Tips for productivity",
    "How does AI work?",
];

const HELP: &str = "\
Type a message and press Enter to send it.
  /new          start a new conversation
  /chats        list saved conversations
  /switch <n>   make conversation <n> active
  /suggest [n]  show starter prompts, or send prompt <n>
  /help         show this help
  /quit         exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Send(String),
    New,
    Chats,
    Switch(usize),
    Suggest(Option<usize>),
    Help,
    Quit,
    Invalid(String),
}

/// Blank lines parse to `None`. Command indices are 1-based.
pub fn parse_input(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(command) = line.strip_prefix('/') else {
        return Some(Input::Send(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();
    let index = |arg: Option<&str>| arg.and_then(|a| a.parse::<usize>().ok()).filter(|n| *n > 0);

    let input = match name {
        "new" => Input::New,
        "chats" | "list" => Input::Chats,
        "switch" =>
            match index(arg) {
                Some(n) => Input::Switch(n),
                None => Input::Invalid("usage: /switch <n>".into()),
            }
        "suggest" =>
            match arg {
                None => Input::Suggest(None),
                Some(_) =>
                    match index(arg) {
                        Some(n) => Input::Suggest(Some(n)),
                        None => Input::Invalid("usage: /suggest [n]".into()),
                    }
            }
        "help" => Input::Help,
        "quit" | "exit" => Input::Quit,
        other => Input::Invalid(format!("unknown command /{}, try /help", other)),
    };
    Some(input)
}

pub fn format_chat_list(state: &ChatState) -> String {
    if state.conversations().is_empty() {
        return "No saved conversations yet.".to_string();
    }
    state
        .conversations()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let marker = if state.active_id() == Some(c.id.as_str()) { '*' } else { ' ' };
            format!(
                "{} {:>2}. {} ({} messages, updated {})",
                marker,
                i + 1,
                c.title,
                c.messages.len(),
                c.updated_at.format("%Y-%m-%d %H:%M")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_message(message: &ChatMessage) -> String {
    let speaker = match message.role {
        Role::User => "You",
        Role::Assistant => "Nova",
        Role::System => "System",
    };
    format!("{}: {}", speaker, message.content)
}

fn format_suggestions() -> String {
    SUGGESTIONS.iter()
        .enumerate()
        .map(|(i, s)| format!("  {}. {}", i + 1, s))
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_conversation(conversation: Option<&Conversation>) {
    match conversation {
        Some(conversation) => {
            println!("── {} ──", conversation.title);
            for message in &conversation.messages {
                println!("{}", format_message(message));
            }
        }
        None => {
            println!("New conversation. Ask anything, or try one of these (/suggest <n>):");
            println!("{}", format_suggestions());
        }
    }
}

pub async fn run_chat(args: &ChatArgs) -> Result<(), Box<dyn Error + Send + Sync>> {
    let client = GatewayClient::new(&args.gateway_url)?;
    info!("Using gateway endpoint {}", client.endpoint());

    let input = BufReader::new(tokio::io::stdin());
    if args.ephemeral {
        run_loop(ConversationStore::load(MemoryStorage::new()), client, input).await;
    } else {
        let storage = FileStorage::new(args.resolve_store_dir());
        info!("Conversations are saved under {}", storage.dir().display());
        run_loop(ConversationStore::load(storage), client, input).await;
    }
    Ok(())
}

/// Consecutive unreadable lines tolerated before the input is treated as closed.
const MAX_READ_FAILURES: usize = 8;

async fn run_loop<S, R>(
    mut store: ConversationStore<S>,
    client: GatewayClient,
    input: R
) -> ConversationStore<S>
    where S: KeyValueStorage, R: AsyncBufRead + Unpin
{
    let (tx, mut rx) = mpsc::channel::<(String, ReplyOutcome)>(4);
    let mut waiting_on: Option<String> = None;
    let mut read_failures = 0;
    let mut lines = input.lines();

    println!("Nova AI, type /help for commands.");
    print_conversation(store.state().active());

    loop {
        tokio::select! {
            Some((conversation_id, outcome)) = rx.recv() => {
                waiting_on = None;
                store.receive(&conversation_id, outcome);
                print_reply(store.state(), &conversation_id);
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Could not read input line: {}", e);
                        read_failures += 1;
                        if read_failures >= MAX_READ_FAILURES {
                            break;
                        }
                        println!("That line could not be read, please try again.");
                        continue;
                    }
                };
                read_failures = 0;
                let Some(input) = parse_input(&line) else {
                    continue;
                };
                let text = match input {
                    Input::Send(text) => text,
                    Input::Suggest(Some(n)) => match SUGGESTIONS.get(n - 1) {
                        Some(s) => s.to_string(),
                        None => {
                            println!("There are only {} suggestions.", SUGGESTIONS.len());
                            continue;
                        }
                    },
                    Input::Suggest(None) => {
                        println!("{}", format_suggestions());
                        continue;
                    }
                    Input::New => {
                        store.start_new();
                        print_conversation(None);
                        continue;
                    }
                    Input::Chats => {
                        println!("{}", format_chat_list(store.state()));
                        continue;
                    }
                    Input::Switch(n) => {
                        match store.state().conversations().get(n - 1).map(|c| c.id.clone()) {
                            Some(id) => {
                                store.switch_active(&id);
                                print_conversation(store.state().active());
                            }
                            None => println!("No conversation #{}, see /chats.", n),
                        }
                        continue;
                    }
                    Input::Help => {
                        println!("{}", HELP);
                        continue;
                    }
                    Input::Quit => break,
                    Input::Invalid(message) => {
                        println!("{}", message);
                        continue;
                    }
                };

                if waiting_on.is_some() {
                    println!("Still waiting for the previous reply, please hold on.");
                    continue;
                }
                if let Some(pending) = store.send(&text) {
                    println!("Nova is thinking…");
                    waiting_on = Some(pending.conversation_id.clone());
                    let client = client.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let outcome = match client.request_reply(pending.messages).await {
                            Ok(reply) => ReplyOutcome::Reply(reply),
                            Err(e) => {
                                warn!("{}", e);
                                ReplyOutcome::TransportFailure
                            }
                        };
                        if let Err(e) = tx.send((pending.conversation_id, outcome)).await {
                            debug!("Dropping reply, chat loop has exited: {}", e);
                        }
                    });
                }
            }
        }
    }

    // A reply still in flight belongs to its conversation; keep it.
    if let Some(conversation_id) = waiting_on {
        println!("Waiting for the last reply before exiting…");
        if let Some((id, outcome)) = rx.recv().await {
            store.receive(&id, outcome);
            print_reply(store.state(), &conversation_id);
        }
    }
    store
}

fn print_reply(state: &ChatState, conversation_id: &str) {
    let Some(conversation) = state.get(conversation_id) else {
        return;
    };
    if state.active_id() != Some(conversation_id) {
        println!("(reply in \"{}\")", conversation.title);
    }
    if let Some(message) = conversation.messages.last() {
        println!("{}", format_message(message));
    }
}
