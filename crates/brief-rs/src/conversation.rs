//! Role-tagged chat history for the conversational mode.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Greeting the history is seeded with on construction and after each reset.
pub const DEFAULT_SYSTEM_PROMPT: &str = "システムメッセージ：あなたの手助けを行います";

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
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

/// A message owned by the conversation store.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Strictly increasing over the life of the store, across resets.
    pub created_order: u64,
}

/// Append-only message log, cleared only by [`reset`](Conversation::reset).
#[derive(Debug, Clone)]
pub struct Conversation {
    system_prompt: String,
    messages: Vec<Message>,
    next_order: u64,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let mut conversation = Self {
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            next_order: 0,
        };
        conversation.seed();
        conversation
    }

    fn seed(&mut self) {
        let prompt = self.system_prompt.clone();
        self.append(Role::System, prompt);
    }

    pub fn append(&mut self, role: Role, content: impl Into<String>) -> &Message {
        let order = self.next_order;
        self.next_order += 1;
        self.messages.push(Message {
            role,
            content: content.into(),
            created_order: order,
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop everything but a fresh copy of the seeded system message.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.seed();
    }

    /// Remove the most recent message if it is a user turn. Used to roll back
    /// a turn whose reply never arrived.
    pub(crate) fn pop_unanswered(&mut self) -> Option<Message> {
        match self.messages.last() {
            Some(m) if m.role == Role::User && self.messages.len() > 1 => self.messages.pop(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_conversation_is_seeded_with_system_message() {
        let conv = Conversation::default();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.history()[0].role, Role::System);
        assert_eq!(conv.history()[0].content, DEFAULT_SYSTEM_PROMPT);
    }

    #[test]
    fn created_order_strictly_increases_across_reset() {
        let mut conv = Conversation::new("be brief");
        conv.append(Role::User, "hi");
        conv.append(Role::Assistant, "hello");
        let before: Vec<u64> = conv.history().iter().map(|m| m.created_order).collect();
        assert!(before.windows(2).all(|w| w[0] < w[1]));

        conv.reset();
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.history()[0].role, Role::System);
        assert_eq!(conv.history()[0].content, "be brief");
        assert!(conv.history()[0].created_order > *before.last().unwrap());

        conv.append(Role::User, "again");
        let after: Vec<u64> = conv.history().iter().map(|m| m.created_order).collect();
        assert!(after.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn pop_unanswered_only_removes_trailing_user_turn() {
        let mut conv = Conversation::default();
        assert!(conv.pop_unanswered().is_none());
        conv.append(Role::User, "q");
        assert_eq!(conv.pop_unanswered().map(|m| m.content), Some("q".into()));
        conv.append(Role::User, "q2");
        conv.append(Role::Assistant, "a2");
        assert!(conv.pop_unanswered().is_none());
        assert_eq!(conv.len(), 3);
    }

    #[test]
    fn role_display_is_lowercase() {
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
