//! Chat backend abstraction
//!
//! The controller talks to the answer engine, tool engine and persistence
//! only through [`ChatBackend`]. [`HttpBackend`] implements it against the
//! REST API; tests substitute an in-memory fake.
//!
//! # Architecture
//!
//! ```text
//! ChatBackend trait
//! ├── HttpBackend (reqwest, production)
//! └── scripted fakes (controller tests)
//! ```

use async_trait::async_trait;
use std::fmt;

mod http;
pub mod types;

pub use http::HttpBackend;
pub use types::{
    answer_text, Clarification, ConversationPair, CustomTool, FeedbackRequest, FileRecord,
    FileUpload, JargonItem, QueryPayload, SessionId, SessionSnapshot, SessionSummary, StoredFile,
    ToolVerdict,
};

use crate::chat::{Role, ToolDraft};

/// Transport-level failures (network errors and non-2xx responses)
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// Request never completed (connection refused, reset, timeout)
    Network(String),
    /// Backend answered with a non-success status
    Status { status: u16, message: String },
    /// Body could not be decoded into the expected shape
    Decode(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::Status { status, message } => {
                write!(f, "Backend error ({}): {}", status, message)
            }
            Self::Decode(msg) => write!(f, "Malformed response: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

/// Operations the session controller consumes
///
/// Every method is a single request; ordering across calls is the caller's
/// business.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Create a session and return its identity
    async fn create_session(&self, title: &str) -> Result<SessionSummary, BackendError>;

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError>;

    async fn fetch_session(&self, session: &SessionId) -> Result<SessionSnapshot, BackendError>;

    /// Persist a message (fire-and-forget from the controller's view)
    async fn post_message(
        &self,
        session: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError>;

    /// Ask the answer engine
    async fn post_query(&self, session: &SessionId, text: &str)
        -> Result<QueryPayload, BackendError>;

    /// Ask the tool engine to build a tool for `query` from the latest draft
    async fn request_tool_creation(
        &self,
        session: &SessionId,
        query: &str,
    ) -> Result<ToolVerdict, BackendError>;

    /// Register a custom tool draft
    async fn create_tool(&self, session: &SessionId, draft: &ToolDraft)
        -> Result<(), BackendError>;

    async fn list_tools(&self, session: &SessionId) -> Result<Vec<CustomTool>, BackendError>;

    async fn delete_tool(&self, session: &SessionId, tool_id: &str) -> Result<(), BackendError>;

    /// Upload file bytes; returns the storage filename
    async fn upload_file(
        &self,
        session: &SessionId,
        file: &FileUpload,
    ) -> Result<StoredFile, BackendError>;

    /// Record metadata for an uploaded file; returns its id when assigned
    async fn register_file(
        &self,
        session: &SessionId,
        stored: &StoredFile,
        original_name: &str,
    ) -> Result<Option<String>, BackendError>;

    async fn delete_file(&self, session: &SessionId, file_id: &str) -> Result<(), BackendError>;

    async fn list_files(&self, session: &SessionId) -> Result<Vec<FileRecord>, BackendError>;

    async fn fetch_conversations(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ConversationPair>, BackendError>;

    /// Submit detailed feedback; returns the revised answer text
    async fn post_feedback(
        &self,
        session: &SessionId,
        request: &FeedbackRequest,
    ) -> Result<String, BackendError>;
}
