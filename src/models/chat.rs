use chrono::{ DateTime, Utc };
use serde::{ Deserialize, Serialize };
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Role-tagged text as exchanged with the gateway and the inference backends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "new_id")]
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn to_wire(&self) -> WireMessage {
        WireMessage::new(self.role, self.content.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Opens a conversation whose title comes from its first user message.
    pub fn start(first: ChatMessage) -> Self {
        let now = first.timestamp;
        Self {
            id: new_id(),
            title: derive_title(&first.content),
            messages: vec![first],
            created_at: now,
            updated_at: now,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.updated_at = message.timestamp;
        self.messages.push(message);
    }

    pub fn wire_messages(&self) -> Vec<WireMessage> {
        self.messages.iter().map(ChatMessage::to_wire).collect()
    }
}

pub const DEFAULT_TITLE: &str = "New chat";
const TITLE_MAX_CHARS: usize = 60;
const TITLE_KEEP_CHARS: usize = 57;

pub fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if trimmed.chars().count() > TITLE_MAX_CHARS {
        let mut title: String = trimmed.chars().take(TITLE_KEEP_CHARS).collect();
        title.push('…');
        title
    } else {
        trimmed.to_string()
    }
}

fn default_title() -> String {
    DEFAULT_TITLE.to_string()
}

// v7 ids sort by creation time.
fn new_id() -> String {
    Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_titles_are_kept_verbatim() {
        let input = "Explain quantum computing in detail please";
        assert_eq!(derive_title(input), input);
        assert_eq!(derive_title("  padded  "), "padded");
    }

    #[test]
    fn long_titles_are_cut_to_57_chars_plus_ellipsis() {
        let input = "a".repeat(80);
        let title = derive_title(&input);
        assert_eq!(title.chars().count(), 58);
        assert!(title.ends_with('…'));
        assert_eq!(&title[..57], &input[..57]);
    }

    #[test]
    fn exactly_sixty_chars_is_not_truncated() {
        let input = "b".repeat(60);
        assert_eq!(derive_title(&input), input);
    }

    #[test]
    fn blank_title_falls_back_to_default() {
        assert_eq!(derive_title("   \n"), DEFAULT_TITLE);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let input = "é".repeat(70);
        let title = derive_title(&input);
        assert_eq!(title.chars().count(), 58);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_string(&WireMessage::new(Role::Assistant, "hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn conversation_fields_use_camel_case() {
        let conversation = Conversation::start(ChatMessage::new(Role::User, "hello", Utc::now()));
        let value = serde_json::to_value(&conversation).unwrap();
        assert!(value.get("createdAt").is_some());
        assert!(value.get("updatedAt").is_some());
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
