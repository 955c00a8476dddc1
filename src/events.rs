// Events emitted by the chat controller
//
// Every transition that changes what the user sees produces one event. The
// REPL ignores them; the transcript writer persists them as JSON Lines.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::SessionId;
use crate::chat::{DraftField, Feedback, MessageId, Outcome};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")] // {"type": "query_resolved", ...}
pub enum ChatEvent {
    /// Session identity became known (created lazily or resumed)
    SessionStarted {
        timestamp: DateTime<Utc>,
        session_id: SessionId,
        title: Option<String>,
        resumed: bool,
    },

    QuerySubmitted {
        timestamp: DateTime<Utc>,
        message_id: MessageId,
        text: String,
    },

    /// Answer installed into `message_id`
    QueryResolved {
        timestamp: DateTime<Utc>,
        message_id: MessageId,
        outcome: Outcome,
    },

    QueryFailed {
        timestamp: DateTime<Utc>,
        error: String,
    },

    ToolDraftSubmitted {
        timestamp: DateTime<Utc>,
        name: String,
    },

    ToolRejected {
        timestamp: DateTime<Utc>,
        field: DraftField,
    },

    ToolAccepted {
        timestamp: DateTime<Utc>,
        name: String,
        /// Whether the parked query was re-run
        rerun: bool,
    },

    FeedbackRated {
        timestamp: DateTime<Utc>,
        message_id: MessageId,
        feedback: Feedback,
    },

    /// Detailed feedback rewrote a message
    FeedbackApplied {
        timestamp: DateTime<Utc>,
        message_id: MessageId,
        re_evaluate: bool,
        clarifications: usize,
    },

    FileUploaded {
        timestamp: DateTime<Utc>,
        name: String,
        storage_id: Option<String>,
    },

    FileRemoved {
        timestamp: DateTime<Utc>,
        name: String,
    },

    /// Non-fatal failure outside the query path
    Error {
        timestamp: DateTime<Utc>,
        message: String,
        context: Option<String>,
    },
}

impl ChatEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::SessionStarted { timestamp, .. }
            | Self::QuerySubmitted { timestamp, .. }
            | Self::QueryResolved { timestamp, .. }
            | Self::QueryFailed { timestamp, .. }
            | Self::ToolDraftSubmitted { timestamp, .. }
            | Self::ToolRejected { timestamp, .. }
            | Self::ToolAccepted { timestamp, .. }
            | Self::FeedbackRated { timestamp, .. }
            | Self::FeedbackApplied { timestamp, .. }
            | Self::FileUploaded { timestamp, .. }
            | Self::FileRemoved { timestamp, .. }
            | Self::Error { timestamp, .. } => *timestamp,
        }
    }
}
