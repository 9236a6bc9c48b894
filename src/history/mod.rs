pub mod state;
pub mod storage;

use chrono::Utc;
use log::{ error, info, warn };
use serde_json::Value as JsonValue;

use crate::models::chat::Conversation;
use self::state::{ ChatState, PendingReply, ReplyOutcome };
use self::storage::{ KeyValueStorage, StoreError };

pub const STORAGE_KEY: &str = "nova-chats";

/// Owns the chat state and mirrors it to storage after every transition.
pub struct ConversationStore<S: KeyValueStorage> {
    state: ChatState,
    storage: S,
    key: String,
}

impl<S: KeyValueStorage> ConversationStore<S> {
    pub fn load(storage: S) -> Self {
        Self::load_with_key(storage, STORAGE_KEY)
    }

    pub fn load_with_key(storage: S, key: &str) -> Self {
        let conversations = match storage.get(key) {
            Ok(Some(raw)) => decode_conversations(&raw),
            Ok(None) => Vec::new(),
            Err(e) => {
                error!("Failed to read saved conversations: {}", e);
                Vec::new()
            }
        };
        info!("Loaded {} saved conversation(s)", conversations.len());

        Self {
            state: ChatState::restored(conversations),
            storage,
            key: key.to_string(),
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn start_new(&mut self) {
        self.apply(ChatState::start_new);
    }

    pub fn switch_active(&mut self, id: &str) {
        self.apply(|state| state.switch_active(id));
    }

    pub fn send(&mut self, text: &str) -> Option<PendingReply> {
        let mut pending = None;
        self.apply(|state| {
            let (next, request) = state.send(text, Utc::now());
            pending = request;
            next
        });
        pending
    }

    pub fn receive(&mut self, conversation_id: &str, outcome: ReplyOutcome) {
        self.apply(|state| state.receive(conversation_id, outcome, Utc::now()));
    }

    /// Runs one transition, then persists the whole set regardless of which
    /// transition it was.
    pub fn apply<F>(&mut self, transition: F) where F: FnOnce(ChatState) -> ChatState {
        let current = std::mem::take(&mut self.state);
        self.state = transition(current);
        self.persist();
    }

    fn persist(&self) {
        if let Err(e) = self.write() {
            error!("Failed to save conversations: {}", e);
        }
    }

    fn write(&self) -> Result<(), StoreError> {
        let encoded = encode_conversations(self.state.conversations())?;
        self.storage.set(&self.key, &encoded)
    }
}

pub fn encode_conversations(conversations: &[Conversation]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(conversations)?)
}

/// Lenient decode: invalid JSON or a non-array yields an empty set, and
/// entries that fail to decode are skipped.
pub fn decode_conversations(raw: &str) -> Vec<Conversation> {
    let entries = match serde_json::from_str::<JsonValue>(raw) {
        Ok(JsonValue::Array(entries)) => entries,
        Ok(other) => {
            warn!("Saved conversations are not a list (found {}), starting fresh", json_kind(&other));
            return Vec::new();
        }
        Err(e) => {
            warn!("Failed to parse saved conversations, starting fresh: {}", e);
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            match serde_json::from_value::<Conversation>(entry) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    warn!("Skipping saved conversation #{}: {}", index, e);
                    None
                }
            }
        })
        .collect()
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a list",
        JsonValue::Object(_) => "an object",
    }
}
