//! Session context: identity bookkeeping, read-only history and the
//! combined display transcript

use serde::Serialize;

use super::timeline::{Feedback, Message, MessageId, Role};
use crate::backend::{ConversationPair, SessionId};
use crate::util::truncate_chars;

/// Length (in characters) of a lazily created session's title
pub const SESSION_TITLE_CHARS: usize = 50;

/// Title for a session created from its first input
pub fn session_title(text: &str) -> String {
    truncate_chars(text.trim(), SESSION_TITLE_CHARS).to_string()
}

/// Historical pairs, fetched at most once per session identity
#[derive(Debug, Clone, Default)]
pub enum HistoryState {
    #[default]
    NotLoaded,
    Loading(SessionId),
    Loaded {
        session: SessionId,
        pairs: Vec<ConversationPair>,
    },
}

impl HistoryState {
    /// Whether a fetch for `session` has started or finished
    pub fn covers(&self, session: &SessionId) -> bool {
        match self {
            Self::NotLoaded => false,
            Self::Loading(id) | Self::Loaded { session: id, .. } => id == session,
        }
    }

    pub fn pairs(&self) -> &[ConversationPair] {
        match self {
            Self::Loaded { pairs, .. } => pairs,
            _ => &[],
        }
    }
}

/// One line of the rendered conversation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayEntry {
    /// `None` for historical entries
    pub id: Option<MessageId>,
    pub role: Role,
    pub content: String,
    pub feedback: Option<Feedback>,
    pub is_loading: bool,
    /// Historical entries accept no feedback or edits
    pub interactive: bool,
}

impl From<&Message> for DisplayEntry {
    fn from(message: &Message) -> Self {
        Self {
            id: Some(message.id),
            role: message.role,
            content: message.content.clone(),
            feedback: message.feedback,
            is_loading: message.is_loading,
            interactive: true,
        }
    }
}

impl DisplayEntry {
    fn historical(role: Role, content: &str) -> Self {
        Self {
            id: None,
            role,
            content: content.to_string(),
            feedback: None,
            is_loading: false,
            interactive: false,
        }
    }
}

/// Live messages (newest first) followed by history, also newest first.
///
/// History pairs arrive oldest first as (user, assistant); reversed, each
/// pair yields its assistant entry before its user entry.
pub fn transcript(live: &[Message], history: &[ConversationPair]) -> Vec<DisplayEntry> {
    let mut entries: Vec<DisplayEntry> = live.iter().map(DisplayEntry::from).collect();
    for pair in history.iter().rev() {
        entries.push(DisplayEntry::historical(Role::Assistant, pair.assistant()));
        entries.push(DisplayEntry::historical(Role::User, pair.user()));
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::timeline::MessageTimeline;

    #[test]
    fn test_session_title_truncates_by_characters() {
        assert_eq!(session_title("  short question "), "short question");

        let long = "é".repeat(80);
        let title = session_title(&long);
        assert_eq!(title.chars().count(), SESSION_TITLE_CHARS);
    }

    #[test]
    fn test_history_state_tracks_identity() {
        let a = SessionId::new("a");
        let b = SessionId::new("b");
        let state = HistoryState::Loading(a.clone());
        assert!(state.covers(&a));
        assert!(!state.covers(&b));
        assert!(state.pairs().is_empty());
        assert!(!HistoryState::NotLoaded.covers(&a));
    }

    #[test]
    fn test_transcript_appends_history_after_live_messages() {
        let mut timeline = MessageTimeline::new();
        timeline.append_pending("live q").unwrap();
        timeline.resolve_pending("live a");

        let history = vec![
            ConversationPair("old q1".into(), "old a1".into()),
            ConversationPair("old q2".into(), "old a2".into()),
        ];
        let entries = transcript(timeline.messages(), &history);
        let contents: Vec<_> = entries.iter().map(|e| e.content.as_str()).collect();

        assert_eq!(
            contents,
            vec!["live a", "live q", "old a2", "old q2", "old a1", "old q1"]
        );
        assert!(entries[0].interactive);
        assert!(entries[2..].iter().all(|e| !e.interactive && e.id.is_none()));
    }
}
