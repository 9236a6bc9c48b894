use chrono::{ DateTime, Utc };
use log::warn;

use crate::models::chat::{ ChatMessage, Conversation, Role, WireMessage };

pub const EMPTY_REPLY_FALLBACK: &str = "I couldn't generate a response.";
pub const TRANSPORT_FAILURE_REPLY: &str = "Something went wrong. Please try again.";

/// A request that has left the store but not yet been answered. The
/// conversation id is fixed at send time so the reply lands in the right
/// conversation even if the user switches away meanwhile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReply {
    pub conversation_id: String,
    pub messages: Vec<WireMessage>,
}

/// What came back for a pending request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Reply(String),
    TransportFailure,
}

impl ReplyOutcome {
    fn into_content(self) -> String {
        match self {
            ReplyOutcome::Reply(text) if !text.trim().is_empty() => text,
            ReplyOutcome::Reply(_) => EMPTY_REPLY_FALLBACK.to_string(),
            ReplyOutcome::TransportFailure => TRANSPORT_FAILURE_REPLY.to_string(),
        }
    }
}

/// Conversations newest-first plus the active pointer. Every operation
/// consumes the state and returns the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    conversations: Vec<Conversation>,
    active_id: Option<String>,
}

impl ChatState {
    /// Restored sets resume with their newest conversation.
    pub fn restored(conversations: Vec<Conversation>) -> Self {
        let active_id = conversations.first().map(|c| c.id.clone());
        Self { conversations, active_id }
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active(&self) -> Option<&Conversation> {
        self.active_id.as_deref().and_then(|id| self.get(id))
    }

    pub fn get(&self, id: &str) -> Option<&Conversation> {
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn start_new(self) -> Self {
        Self { active_id: None, ..self }
    }

    pub fn switch_active(self, id: &str) -> Self {
        if self.get(id).is_none() {
            warn!("Ignoring switch to unknown conversation {}", id);
            return self;
        }
        Self { active_id: Some(id.to_string()), ..self }
    }

    /// Records a user message. Whitespace-only text changes nothing and
    /// produces no pending request.
    pub fn send(mut self, text: &str, now: DateTime<Utc>) -> (Self, Option<PendingReply>) {
        let content = text.trim();
        if content.is_empty() {
            return (self, None);
        }
        let message = ChatMessage::new(Role::User, content, now);

        let position = self.active_id
            .as_deref()
            .and_then(|id| self.conversations.iter().position(|c| c.id == id));
        let conversation = match position {
            Some(index) => {
                let conversation = &mut self.conversations[index];
                conversation.push(message);
                conversation
            }
            None => {
                let conversation = Conversation::start(message);
                self.active_id = Some(conversation.id.clone());
                self.conversations.insert(0, conversation);
                &mut self.conversations[0]
            }
        };

        let pending = PendingReply {
            conversation_id: conversation.id.clone(),
            messages: conversation.wire_messages(),
        };
        (self, Some(pending))
    }

    /// Appends the assistant reply to the conversation captured at send time.
    pub fn receive(mut self, conversation_id: &str, outcome: ReplyOutcome, now: DateTime<Utc>) -> Self {
        match self.conversations.iter_mut().find(|c| c.id == conversation_id) {
            Some(conversation) => {
                conversation.push(ChatMessage::new(Role::Assistant, outcome.into_content(), now));
            }
            None => {
                warn!("Dropping reply for unknown conversation {}", conversation_id);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn first_send_creates_one_conversation_at_the_front() {
        let (state, pending) = ChatState::default().send("  Hello there  ", t(0));
        let pending = pending.unwrap();

        assert_eq!(state.conversations().len(), 1);
        let conversation = &state.conversations()[0];
        assert_eq!(conversation.title, "Hello there");
        assert_eq!(state.active_id(), Some(conversation.id.as_str()));
        assert_eq!(pending.conversation_id, conversation.id);
        assert_eq!(pending.messages, vec![WireMessage::new(Role::User, "Hello there")]);
        assert_eq!(conversation.created_at, t(0));
    }

    #[test]
    fn new_conversations_go_in_front_of_older_ones() {
        let (state, _) = ChatState::default().send("first", t(0));
        let (state, _) = state.start_new().send("second", t(1));
        let titles: Vec<&str> = state.conversations().iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first"]);
    }

    #[test]
    fn long_first_message_truncates_title() {
        let text = "x".repeat(80);
        let (state, _) = ChatState::default().send(&text, t(0));
        let title = &state.conversations()[0].title;
        assert_eq!(title, &format!("{}…", "x".repeat(57)));
    }

    #[test]
    fn follow_up_appends_and_refreshes_updated_at() {
        let (state, _) = ChatState::default().send("one", t(0));
        let (state, pending) = state.send("two", t(5));

        let conversation = state.active().unwrap();
        assert_eq!(state.conversations().len(), 1);
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.updated_at, t(5));
        assert_eq!(conversation.created_at, t(0));
        assert_eq!(conversation.title, "one");
        assert_eq!(pending.unwrap().messages.len(), 2);
    }

    #[test]
    fn blank_input_is_ignored() {
        let (state, pending) = ChatState::default().send(" \n\t", t(0));
        assert!(pending.is_none());
        assert!(state.conversations().is_empty());
    }

    #[test]
    fn pending_request_only_carries_its_own_conversation() {
        let (state, _) = ChatState::default().send("old topic", t(0));
        let (state, pending) = state.start_new().send("new topic", t(1));
        assert_eq!(pending.unwrap().messages, vec![WireMessage::new(Role::User, "new topic")]);
        assert_eq!(state.conversations().len(), 2);
    }

    #[test]
    fn reply_lands_in_original_conversation_after_switch() {
        let (state, _) = ChatState::default().send("older", t(0));
        let older_id = state.active_id().unwrap().to_string();
        let (state, pending) = state.start_new().send("newer", t(1));
        let pending = pending.unwrap();

        let state = state.switch_active(&older_id);
        let state = state.receive(&pending.conversation_id, ReplyOutcome::Reply("answer".into()), t(2));

        let newer = state.get(&pending.conversation_id).unwrap();
        assert_eq!(newer.messages.last().unwrap().content, "answer");
        assert_eq!(newer.messages.last().unwrap().role, Role::Assistant);
        assert_eq!(newer.updated_at, t(2));
        assert_eq!(state.get(&older_id).unwrap().messages.len(), 1);
        assert_eq!(state.active_id(), Some(older_id.as_str()));
    }

    #[test]
    fn blank_reply_and_transport_failure_become_readable_messages() {
        let (state, pending) = ChatState::default().send("hi", t(0));
        let id = pending.unwrap().conversation_id;
        let state = state
            .receive(&id, ReplyOutcome::Reply("  ".into()), t(1))
            .receive(&id, ReplyOutcome::TransportFailure, t(2));
        let contents: Vec<&str> = state
            .get(&id)
            .unwrap()
            .messages.iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["hi", EMPTY_REPLY_FALLBACK, TRANSPORT_FAILURE_REPLY]);
    }

    #[test]
    fn switch_to_unknown_id_keeps_state() {
        let (state, _) = ChatState::default().send("hi", t(0));
        let before = state.clone();
        assert_eq!(state.switch_active("missing"), before);
    }

    #[test]
    fn start_new_keeps_existing_conversations() {
        let (state, _) = ChatState::default().send("hi", t(0));
        let state = state.start_new();
        assert!(state.active().is_none());
        assert_eq!(state.conversations().len(), 1);
    }

    #[test]
    fn message_ids_are_unique_and_ordered() {
        let (mut state, _) = ChatState::default().send("m0", t(0));
        for i in 1..20 {
            state = state.send(&format!("m{}", i), t(0) + Duration::seconds(i)).0;
        }
        let ids: Vec<&str> = state.active().unwrap().messages.iter().map(|m| m.id.as_str()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted, ids);
    }
}
