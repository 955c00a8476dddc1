//! Wire types for the chat backend REST API
//!
//! Field names follow the backend's JSON exactly (including its
//! `API_REFLEXTION_FLAG` spelling); the Rust side uses descriptive names.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// Backend-assigned chat session identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Entry of the session list, also returned by session creation
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub title: String,
    /// Kept as text: the backend emits naive timestamps without an offset
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Full session as returned by "fetch session by id"
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub title: String,
}

/// Read-only historical (user, assistant) exchange
///
/// Deserializes from the backend's two-element array form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationPair(pub String, pub String);

impl ConversationPair {
    pub fn user(&self) -> &str {
        &self.0
    }

    pub fn assistant(&self) -> &str {
        &self.1
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationsEnvelope {
    #[serde(default)]
    pub conversations: Vec<ConversationPair>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

/// Envelope of `POST /chats/{id}/query`
#[derive(Debug, Clone, Deserialize)]
pub struct QueryEnvelope {
    pub response: QueryPayload,
}

/// The two-flag answer payload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QueryPayload {
    /// Set when the available tools cannot answer the query
    #[serde(rename = "API_REFLEXTION_FLAG", default)]
    pub missing_capability: Option<bool>,

    /// Set when the grounded answer should be reviewed by the user
    #[serde(rename = "RAG_FLAG", default)]
    pub needs_review: Option<bool>,

    /// Shape depends on the flags: plain text, or `[_, {func_response, jargon}]`
    #[serde(rename = "Final_Answer", default)]
    pub final_answer: Value,
}

impl QueryPayload {
    pub fn direct(answer: impl Into<String>) -> Self {
        Self {
            missing_capability: Some(false),
            needs_review: Some(false),
            final_answer: Value::String(answer.into()),
        }
    }
}

/// Domain term surfaced next to a reviewable answer
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct JargonItem {
    pub word: String,
    #[serde(default)]
    pub meaning: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// Backend decision on a tool-creation request
#[derive(Debug, Clone, PartialEq)]
pub enum ToolVerdict {
    NameInvalid,
    DocInvalid,
    /// Opaque success value
    Accepted(Value),
}

impl ToolVerdict {
    pub fn from_response(response: Value) -> Self {
        match response.as_str() {
            Some("NAME_INVALID") => Self::NameInvalid,
            Some("DOC_INVALID") => Self::DocInvalid,
            _ => Self::Accepted(response),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseEnvelope {
    #[serde(default)]
    pub response: Value,
}

/// Custom tool registered for a session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CustomTool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "python_code")]
    pub code: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Files
// ─────────────────────────────────────────────────────────────────────────────

/// A local file about to be uploaded
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub name: String,
    pub bytes: Bytes,
}

impl FileUpload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Response of the binary upload
#[derive(Debug, Clone, Deserialize)]
pub struct StoredFile {
    /// Storage filename assigned by the backend
    pub filename: String,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RegisteredFile {
    #[serde(default)]
    pub file_id: Option<String>,
}

/// File metadata row as listed for a session
#[derive(Debug, Clone, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub filename: String,
    #[serde(default)]
    pub original_filename: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Feedback
// ─────────────────────────────────────────────────────────────────────────────

/// Word/meaning pair sent with detailed feedback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    pub word: String,
    pub meaning: String,
}

/// Body of `POST /chats/{id}/feedback`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRequest {
    pub feedback: String,
    pub clarification: Vec<Clarification>,
    pub query: String,
    pub re_evaluate: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedbackEnvelope {
    pub response: FeedbackAnswer,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeedbackAnswer {
    #[serde(rename = "Final Answer", default)]
    pub final_answer: Value,
}

/// Render an answer value as display text.
///
/// Strings are used verbatim, `null` becomes empty text and anything else is
/// rendered as compact JSON.
pub fn answer_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
