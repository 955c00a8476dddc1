//! Detailed feedback form
//!
//! The form is armed against one assistant message, either by a thumbs
//! rating or by a review-flagged answer. Items seeded from backend jargon
//! keep their word locked; only the meaning can change.

use serde::Serialize;

use super::error::ChatError;
use super::timeline::MessageId;
use crate::backend::{Clarification, JargonItem};

/// One word/meaning row of the form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClarificationItem {
    pub word: String,
    pub meaning: String,
    pub is_pre_filled: bool,
}

impl ClarificationItem {
    pub fn blank() -> Self {
        Self {
            word: String::new(),
            meaning: String::new(),
            is_pre_filled: false,
        }
    }

    pub fn new(word: impl Into<String>, meaning: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            meaning: meaning.into(),
            is_pre_filled: false,
        }
    }

    fn from_jargon(item: &JargonItem) -> Self {
        Self {
            word: item.word.clone(),
            meaning: item.meaning.clone().unwrap_or_default(),
            is_pre_filled: true,
        }
    }

    fn is_complete(&self) -> bool {
        !self.word.trim().is_empty() && !self.meaning.trim().is_empty()
    }
}

/// Text plus clarifications, ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackSubmission {
    pub feedback_text: String,
    pub clarifications: Vec<Clarification>,
}

impl FeedbackSubmission {
    /// Build a submission, dropping items with a blank word or meaning.
    /// Kept items are passed through verbatim.
    pub fn build(feedback_text: impl Into<String>, items: &[ClarificationItem]) -> Self {
        Self {
            feedback_text: feedback_text.into(),
            clarifications: items
                .iter()
                .filter(|item| item.is_complete())
                .map(|item| Clarification {
                    word: item.word.clone(),
                    meaning: item.meaning.clone(),
                })
                .collect(),
        }
    }
}

/// Armed detailed-feedback form
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackForm {
    /// Message that will be rewritten on success
    pub target: MessageId,
    /// Coarse rating; a negative (or review-triggered) form asks for re-evaluation
    pub positive: bool,
    pub items: Vec<ClarificationItem>,
    /// Set while the detailed submission awaits the backend
    submitting: bool,
}

impl FeedbackForm {
    /// Form armed by a thumbs rating
    pub fn for_rating(target: MessageId, positive: bool) -> Self {
        Self {
            target,
            positive,
            items: vec![ClarificationItem::blank()],
            submitting: false,
        }
    }

    /// Form armed by a review-flagged answer
    pub fn for_review(target: MessageId, jargon: &[JargonItem]) -> Self {
        let items = if jargon.is_empty() {
            vec![ClarificationItem::blank()]
        } else {
            jargon.iter().map(ClarificationItem::from_jargon).collect()
        };
        Self {
            target,
            positive: false,
            items,
            submitting: false,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Whether a submission for `target` is awaiting the backend
    pub fn is_submitting_for(&self, target: MessageId) -> bool {
        self.submitting && self.target == target
    }

    pub(crate) fn set_submitting(&mut self, submitting: bool) {
        self.submitting = submitting;
    }

    pub fn re_evaluate(&self) -> bool {
        !self.positive
    }

    pub fn add_item(&mut self) -> usize {
        self.items.push(ClarificationItem::blank());
        self.items.len() - 1
    }

    pub fn set_word(&mut self, index: usize, word: impl Into<String>) -> Result<(), ChatError> {
        let item = self
            .items
            .get_mut(index)
            .ok_or(ChatError::UnknownClarification(index))?;
        if item.is_pre_filled {
            return Err(ChatError::WordLocked(item.word.clone()));
        }
        item.word = word.into();
        Ok(())
    }

    pub fn set_meaning(
        &mut self,
        index: usize,
        meaning: impl Into<String>,
    ) -> Result<(), ChatError> {
        let item = self
            .items
            .get_mut(index)
            .ok_or(ChatError::UnknownClarification(index))?;
        item.meaning = meaning.into();
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> Result<ClarificationItem, ChatError> {
        if index >= self.items.len() {
            return Err(ChatError::UnknownClarification(index));
        }
        Ok(self.items.remove(index))
    }

    pub fn submission(&self, feedback_text: impl Into<String>) -> FeedbackSubmission {
        FeedbackSubmission::build(feedback_text, &self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jargon(word: &str, meaning: Option<&str>) -> JargonItem {
        JargonItem {
            word: word.to_string(),
            meaning: meaning.map(str::to_string),
        }
    }

    #[test]
    fn test_review_form_seeds_locked_items() {
        let form = FeedbackForm::for_review(MessageId(1), &[jargon("GDP", None)]);
        assert_eq!(
            form.items,
            vec![ClarificationItem {
                word: "GDP".to_string(),
                meaning: String::new(),
                is_pre_filled: true,
            }]
        );
        assert!(form.re_evaluate());
    }

    #[test]
    fn test_rating_form_starts_with_blank_item() {
        let form = FeedbackForm::for_rating(MessageId(1), true);
        assert_eq!(form.items, vec![ClarificationItem::blank()]);
        assert!(!form.re_evaluate());
    }

    #[test]
    fn test_pre_filled_word_cannot_change() {
        let mut form = FeedbackForm::for_review(MessageId(1), &[jargon("GDP", Some(""))]);
        assert!(matches!(
            form.set_word(0, "GNP"),
            Err(ChatError::WordLocked(ref w)) if w == "GDP"
        ));
        form.set_meaning(0, "gross domestic product").unwrap();
        assert_eq!(form.items[0].meaning, "gross domestic product");
    }

    #[test]
    fn test_submission_drops_incomplete_items() {
        let items = vec![
            ClarificationItem::new("", "meaning only"),
            ClarificationItem::new("word only", "  "),
            ClarificationItem::new("GDP", " gross domestic product "),
        ];
        let submission = FeedbackSubmission::build("wrong figure", &items);

        assert_eq!(submission.feedback_text, "wrong figure");
        assert_eq!(
            submission.clarifications,
            vec![Clarification {
                word: "GDP".to_string(),
                meaning: " gross domestic product ".to_string(),
            }]
        );
    }

    #[test]
    fn test_item_editing_bounds() {
        let mut form = FeedbackForm::for_rating(MessageId(1), false);
        let index = form.add_item();
        assert_eq!(index, 1);
        form.set_word(index, "CPI").unwrap();
        assert!(form.set_meaning(5, "x").is_err());
        assert_eq!(form.remove_item(0).unwrap(), ClarificationItem::blank());
        assert_eq!(form.items[0].word, "CPI");
        assert!(form.remove_item(3).is_err());
    }

    #[test]
    fn test_submitting_flag_is_scoped_to_target() {
        let mut form = FeedbackForm::for_rating(MessageId(4), false);
        assert!(!form.is_submitting_for(MessageId(4)));

        form.set_submitting(true);
        assert!(form.is_submitting());
        assert!(form.is_submitting_for(MessageId(4)));
        assert!(!form.is_submitting_for(MessageId(5)));

        form.set_submitting(false);
        assert!(!form.is_submitting());
    }
}
