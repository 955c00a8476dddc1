// Tool-reflexion state - the "missing capability" sub-workflow
//
// A capability gap parks the original query and the assistant message that
// reported it (the slot). The user supplies a tool draft, the backend
// validates it, and on success the parked query is re-run and its answer is
// installed into the slot.
//
//   Idle ──gap──▶ AwaitingDraft ──submit──▶ Submitting ──┬─ accepted ─▶ Idle (re-run)
//                   ▲     │                               ├─ NAME/DOC_INVALID ─▶ AwaitingDraft
//                   │     └─decline─▶ Closed ◀────────────┴─ transport error
//                   └──────reopen──────┘

use serde::Serialize;

use super::timeline::MessageId;

/// Slot text while the draft is being registered
pub const CREATING_TOOL_PLACEHOLDER: &str = "Creating new tool...";
/// Optional notice between tool acceptance and the re-run
pub const TOOL_ADDED_NOTICE: &str = "Tool added successfully. Re-running your query...";
pub const NAME_INVALID_PROMPT: &str = "Please provide the name for the tool.";
pub const DOC_INVALID_PROMPT: &str = "Please provide the docstring for the tool.";
pub const DECLINED_MESSAGE: &str = "Sorry, I won't be able to move forward without any tool information. Would you like to try adding a tool again?";

/// User-authored tool extension
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolDraft {
    pub name: String,
    pub description: Option<String>,
    pub code: Option<String>,
}

impl ToolDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Trimmed description, `None` when blank
    pub fn description(&self) -> Option<&str> {
        non_blank(self.description.as_deref())
    }

    /// Trimmed code, `None` when blank
    pub fn code(&self) -> Option<&str> {
        non_blank(self.code.as_deref())
    }

    /// Check the draft before any call is made
    pub fn validate(&self) -> Result<(), DraftProblem> {
        if self.name.trim().is_empty() {
            return Err(DraftProblem::MissingName);
        }
        if self.description().is_none() && self.code().is_none() {
            return Err(DraftProblem::MissingBody);
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Client-side draft rejection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftProblem {
    MissingName,
    /// Neither description nor code was given
    MissingBody,
}

impl std::fmt::Display for DraftProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "tool name is required"),
            Self::MissingBody => write!(f, "provide either code or a description"),
        }
    }
}

/// Draft field the backend rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Name,
    Docstring,
}

impl DraftField {
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::Name => NAME_INVALID_PROMPT,
            Self::Docstring => DOC_INVALID_PROMPT,
        }
    }
}

impl std::fmt::Display for DraftField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Docstring => write!(f, "docstring"),
        }
    }
}

/// Why a draft form was closed without success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Declined,
    TransportError,
}

/// Armed tool-reflexion state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReflexionState {
    #[default]
    Idle,
    /// Draft form open; `flagged` marks a field the backend rejected
    AwaitingDraft {
        rerun_query: String,
        slot: MessageId,
        flagged: Option<DraftField>,
    },
    Submitting {
        rerun_query: String,
        slot: MessageId,
    },
    /// Form closed; the query is kept so the user can reopen it
    Closed {
        rerun_query: String,
        slot: MessageId,
        reason: CloseReason,
    },
}

impl ReflexionState {
    pub fn awaiting(rerun_query: impl Into<String>, slot: MessageId) -> Self {
        Self::AwaitingDraft {
            rerun_query: rerun_query.into(),
            slot,
            flagged: None,
        }
    }

    /// Query that will be re-run once a tool is accepted
    pub fn pending_rerun_query(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::AwaitingDraft { rerun_query, .. }
            | Self::Submitting { rerun_query, .. }
            | Self::Closed { rerun_query, .. } => Some(rerun_query),
        }
    }

    pub fn slot(&self) -> Option<MessageId> {
        match self {
            Self::Idle => None,
            Self::AwaitingDraft { slot, .. }
            | Self::Submitting { slot, .. }
            | Self::Closed { slot, .. } => Some(*slot),
        }
    }

    /// Whether the draft form should be shown
    pub fn is_form_open(&self) -> bool {
        matches!(self, Self::AwaitingDraft { .. })
    }

    pub fn flagged_field(&self) -> Option<DraftField> {
        match self {
            Self::AwaitingDraft { flagged, .. } => *flagged,
            _ => None,
        }
    }
}
