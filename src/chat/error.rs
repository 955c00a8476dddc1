//! Controller errors

use std::fmt;

use super::reflexion::{DraftField, DraftProblem};
use super::timeline::MessageId;
use crate::backend::BackendError;

/// Failure of a controller operation
///
/// None of these are fatal to the session; the controller state is left
/// consistent before any of them is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Network or non-2xx response from the backend
    Transport(BackendError),
    /// Backend rejected a tool draft field
    Rejected(DraftField),
    /// Tool draft failed client-side validation; no call was made
    InvalidDraft(DraftProblem),
    /// A response (or tool slot) is still loading
    QueryInFlight,
    EmptyQuery,
    /// No feedback form (or tool form) is armed
    NotArmed,
    UnknownMessage(MessageId),
    /// The message is still loading
    MessagePending(MessageId),
    /// A detailed feedback submission for this message is awaiting the backend
    FeedbackInFlight(MessageId),
    /// Only assistant messages can be rated
    NotRateable(MessageId),
    UnknownClarification(usize),
    /// Pre-filled clarification words cannot be edited
    WordLocked(String),
    /// The operation needs an established session
    NoSession,
    /// `resume` called after an identity was already established
    SessionAlreadyStarted,
    /// Tool draft form is closed; reopen it first
    DraftFormClosed,
    ToolSubmissionInFlight,
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(err) => write!(f, "{}", err),
            Self::Rejected(field) => write!(f, "Backend rejected the tool {}", field),
            Self::InvalidDraft(problem) => write!(f, "Invalid tool draft: {}", problem),
            Self::QueryInFlight => write!(f, "A response is still being generated"),
            Self::EmptyQuery => write!(f, "Query text is empty"),
            Self::NotArmed => write!(f, "No form is open"),
            Self::UnknownMessage(id) => write!(f, "No message with id {}", id),
            Self::MessagePending(id) => write!(f, "Message {} is still loading", id),
            Self::FeedbackInFlight(id) => {
                write!(f, "Feedback for message {} is still being sent", id)
            }
            Self::NotRateable(id) => write!(f, "Message {} is not an assistant reply", id),
            Self::UnknownClarification(index) => write!(f, "No clarification at {}", index),
            Self::WordLocked(word) => write!(f, "The word '{}' cannot be changed", word),
            Self::NoSession => write!(f, "No session has been started yet"),
            Self::SessionAlreadyStarted => write!(f, "A session is already active"),
            Self::DraftFormClosed => write!(f, "The tool form is closed"),
            Self::ToolSubmissionInFlight => write!(f, "A tool draft is already being submitted"),
        }
    }
}

impl std::error::Error for ChatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for ChatError {
    fn from(err: BackendError) -> Self {
        Self::Transport(err)
    }
}

impl From<DraftProblem> for ChatError {
    fn from(problem: DraftProblem) -> Self {
        Self::InvalidDraft(problem)
    }
}
