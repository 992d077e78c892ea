//! UI-agnostic chat state types
//!
//! This module contains the data structures shared between the session and
//! whatever view layer renders it. Nothing here depends on a UI framework.

use std::ops::Index;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// An immutable snapshot of the conversation.
///
/// Mutating operations return a new `Transcript`; the previous value is left
/// untouched, so observers can compare snapshots with [`Transcript::same_snapshot`]
/// instead of walking the messages. Messages are shared between snapshots, so
/// a new snapshot costs one pointer per message.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Arc<Vec<Arc<ChatMessage>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// New snapshot with `message` appended.
    pub fn push(&self, message: ChatMessage) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(Arc::new(message));
        Self {
            messages: Arc::new(messages),
        }
    }

    /// New snapshot with the last message swapped for `message`.
    /// On an empty transcript this behaves like [`Transcript::push`].
    pub fn replace_last(&self, message: ChatMessage) -> Self {
        let keep = self.messages.len().saturating_sub(1);
        let mut messages = Vec::with_capacity(keep + 1);
        messages.extend(self.messages[..keep].iter().cloned());
        messages.push(Arc::new(message));
        Self {
            messages: Arc::new(messages),
        }
    }

    /// True when both values point at the same underlying snapshot.
    pub fn same_snapshot(&self, other: &Transcript) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index).map(|m| m.as_ref())
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last().map(|m| m.as_ref())
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ChatMessage> + ExactSizeIterator + '_ {
        self.messages.iter().map(|m| m.as_ref())
    }

    /// Most recent assistant reply, if any.
    pub fn last_assistant(&self) -> Option<&ChatMessage> {
        self.iter().rev().find(|m| m.role == ChatRole::Assistant)
    }
}

impl Index<usize> for Transcript {
    type Output = ChatMessage;

    fn index(&self, index: usize) -> &Self::Output {
        &self.messages[index]
    }
}

impl PartialEq for Transcript {
    fn eq(&self, other: &Self) -> bool {
        self.same_snapshot(other) || self.messages == other.messages
    }
}

impl From<Vec<ChatMessage>> for Transcript {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages: Arc::new(messages.into_iter().map(Arc::new).collect()),
        }
    }
}

/// Generation parameters forwarded to the endpoint as-is.
///
/// Range checks belong to whoever edits these values; the session never
/// clamps or rejects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o".to_string(),
            temperature: 1.0,
            max_tokens: 4096,
            top_p: 1.0,
        }
    }
}

/// What observers see after every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub transcript: Transcript,
    pub loading: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_leaves_previous_snapshot_untouched() {
        let first = Transcript::new().push(ChatMessage::user("hi"));
        let second = first.push(ChatMessage::assistant(""));

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert!(!first.same_snapshot(&second));
    }

    #[test]
    fn replace_last_swaps_only_the_tail() {
        let t = Transcript::new()
            .push(ChatMessage::user("hi"))
            .push(ChatMessage::assistant("Hel"));
        let updated = t.replace_last(ChatMessage::assistant("Hello"));

        assert_eq!(t[1].content, "Hel");
        assert_eq!(updated[0], ChatMessage::user("hi"));
        assert_eq!(updated[1].content, "Hello");
        assert!(!t.same_snapshot(&updated));
    }

    #[test]
    fn new_snapshots_share_earlier_messages() {
        let t = Transcript::new()
            .push(ChatMessage::user("a long question"))
            .push(ChatMessage::assistant("He"));
        let updated = t.replace_last(ChatMessage::assistant("Hello"));
        let extended = updated.push(ChatMessage::user("next"));

        assert!(Arc::ptr_eq(&t.messages[0], &updated.messages[0]));
        assert!(Arc::ptr_eq(&updated.messages[0], &extended.messages[0]));
        assert!(Arc::ptr_eq(&updated.messages[1], &extended.messages[1]));
        assert!(!Arc::ptr_eq(&t.messages[1], &updated.messages[1]));
    }

    #[test]
    fn clones_share_the_snapshot() {
        let t = Transcript::new().push(ChatMessage::user("hi"));
        let c = t.clone();
        assert!(t.same_snapshot(&c));
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }

    #[test]
    fn last_assistant_skips_trailing_user_message() {
        let t = Transcript::from(vec![
            ChatMessage::user("a"),
            ChatMessage::assistant("b"),
            ChatMessage::user("c"),
        ]);
        assert_eq!(t.last_assistant().map(|m| m.content.as_str()), Some("b"));
    }
}
