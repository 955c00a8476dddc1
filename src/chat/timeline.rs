//! Message timeline with the loading-placeholder protocol
//!
//! Messages are stored newest-first. At most one message is loading at any
//! time, and a loading message always sits directly in front of (newer than)
//! the user message that triggered it.
//!
//! Sub-controllers never hold indexes into the list across an await. They
//! keep a [`MessageId`] and resolve it again when they apply a transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder text shown while a query is in flight
pub const GENERATING_PLACEHOLDER: &str = "Generating response...";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse thumbs-up / thumbs-down rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    Positive,
    Negative,
}

impl Feedback {
    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }
}

/// Stable handle for a message, valid for the lifetime of its timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single chat message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub feedback: Option<Feedback>,
    pub is_loading: bool,
    pub created_at: DateTime<Utc>,
}

/// Ids of the pair inserted by [`MessageTimeline::append_pending`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingPair {
    pub user: MessageId,
    pub placeholder: MessageId,
}

/// Ordered, newest-first list of messages
#[derive(Debug, Clone, Default)]
pub struct MessageTimeline {
    messages: Vec<Message>,
    next_id: u64,
}

impl MessageTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, role: Role, content: String, is_loading: bool) -> Message {
        self.next_id += 1;
        Message {
            id: MessageId(self.next_id),
            role,
            content,
            feedback: None,
            is_loading,
            created_at: Utc::now(),
        }
    }

    /// All messages, newest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Current position of a message (0 = newest)
    pub fn index_of(&self, id: MessageId) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Id of the loading element, if any
    pub fn pending_id(&self) -> Option<MessageId> {
        self.messages.iter().find(|m| m.is_loading).map(|m| m.id)
    }

    pub fn has_pending(&self) -> bool {
        self.pending_id().is_some()
    }

    /// Insert a user message and its loading placeholder at the head.
    ///
    /// Returns `None` (and leaves the timeline untouched) while another
    /// loading element exists.
    pub fn append_pending(&mut self, user_text: impl Into<String>) -> Option<PendingPair> {
        if self.has_pending() {
            return None;
        }

        let user = self.allocate(Role::User, user_text.into(), false);
        let placeholder =
            self.allocate(Role::Assistant, GENERATING_PLACEHOLDER.to_string(), true);
        let pair = PendingPair {
            user: user.id,
            placeholder: placeholder.id,
        };

        // newest-first: placeholder, then the user message that triggered it
        self.messages.insert(0, user);
        self.messages.insert(0, placeholder);
        Some(pair)
    }

    /// Replace the loading element's content and clear its loading flag
    pub fn resolve_pending(&mut self, final_text: impl Into<String>) -> Option<MessageId> {
        let message = self.messages.iter_mut().find(|m| m.is_loading)?;
        message.content = final_text.into();
        message.is_loading = false;
        Some(message.id)
    }

    /// Update the placeholder text without resolving it
    pub fn set_pending_text(&mut self, text: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.is_loading) {
            Some(message) => {
                message.content = text.into();
                true
            }
            None => false,
        }
    }

    /// Remove the loading element (transport failure path)
    pub fn discard_pending(&mut self) -> Option<Message> {
        let index = self.messages.iter().position(|m| m.is_loading)?;
        Some(self.messages.remove(index))
    }

    /// Turn an existing assistant message back into the loading element.
    ///
    /// Fails when another element is already loading or the message is not
    /// an assistant message.
    pub fn reopen_pending(&mut self, id: MessageId, placeholder: impl Into<String>) -> bool {
        if self.has_pending() {
            return false;
        }
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if message.role == Role::Assistant => {
                message.content = placeholder.into();
                message.is_loading = true;
                true
            }
            _ => false,
        }
    }

    /// In-place content replacement of a settled message
    pub fn mutate_at(&mut self, id: MessageId, new_content: impl Into<String>) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) if !message.is_loading => {
                message.content = new_content.into();
                true
            }
            _ => false,
        }
    }

    /// Add a terminal assistant message at the head
    pub fn push_assistant(&mut self, text: impl Into<String>) -> MessageId {
        let message = self.allocate(Role::Assistant, text.into(), false);
        let id = message.id;
        self.messages.insert(0, message);
        id
    }

    pub fn set_feedback(&mut self, id: MessageId, feedback: Feedback) -> bool {
        match self.messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.feedback = Some(feedback);
                true
            }
            None => false,
        }
    }

    /// Content of the nearest user message at or older than `id`
    pub fn preceding_user_text(&self, id: MessageId) -> Option<&str> {
        let start = self.index_of(id)?;
        self.messages[start..]
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}
