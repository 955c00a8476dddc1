//! Controller tests against a scripted in-memory backend

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use super::reflexion::{DECLINED_MESSAGE, NAME_INVALID_PROMPT};
use super::resolver::CAPABILITY_GAP_FALLBACK;
use super::*;
use crate::backend::{
    BackendError, ChatBackend, ConversationPair, CustomTool, FeedbackRequest, FileRecord,
    FileUpload, QueryPayload, SessionId, SessionSnapshot, SessionSummary, StoredFile, ToolVerdict,
};

// ─────────────────────────────────────────────────────────────────────────────
// Fake backend
// ─────────────────────────────────────────────────────────────────────────────

/// Pops scripted results in order; falls back to a plain success when a
/// script runs dry. Every call is recorded as "operation:argument".
#[derive(Default)]
struct FakeBackend {
    calls: Mutex<Vec<String>>,
    queries: Mutex<VecDeque<Result<QueryPayload, BackendError>>>,
    verdicts: Mutex<VecDeque<Result<ToolVerdict, BackendError>>>,
    uploads: Mutex<VecDeque<Result<StoredFile, BackendError>>>,
    deletes: Mutex<VecDeque<Result<(), BackendError>>>,
    feedback: Mutex<VecDeque<Result<String, BackendError>>>,
    feedback_requests: Mutex<Vec<FeedbackRequest>>,
    history: Mutex<Vec<ConversationPair>>,
    /// When set, `post_query` and `post_feedback` wait for `gate` before answering
    gated: AtomicBool,
    gate: Notify,
}

fn network() -> BackendError {
    BackendError::Network("connection refused".to_string())
}

fn pop<T>(queue: &Mutex<VecDeque<T>>) -> Option<T> {
    queue.lock().unwrap().pop_front()
}

impl FakeBackend {
    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn calls_to(&self, operation: &str) -> Vec<String> {
        let prefix = format!("{}:", operation);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .map(|c| c[prefix.len()..].to_string())
            .collect()
    }

    fn script_query(&self, result: Result<QueryPayload, BackendError>) {
        self.queries.lock().unwrap().push_back(result);
    }
}

#[async_trait]
impl ChatBackend for FakeBackend {
    async fn create_session(&self, title: &str) -> Result<SessionSummary, BackendError> {
        self.record(format!("create_session:{}", title));
        tokio::task::yield_now().await;
        Ok(SessionSummary {
            id: SessionId::new("s1"),
            title: title.to_string(),
            created_at: None,
        })
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        Ok(Vec::new())
    }

    async fn fetch_session(&self, session: &SessionId) -> Result<SessionSnapshot, BackendError> {
        self.record(format!("fetch_session:{}", session));
        Ok(SessionSnapshot {
            id: session.clone(),
            title: "Quarterly numbers".to_string(),
        })
    }

    async fn post_message(
        &self,
        _session: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError> {
        self.record(format!("post_message:{}:{}", role, content));
        Ok(())
    }

    async fn post_query(
        &self,
        _session: &SessionId,
        text: &str,
    ) -> Result<QueryPayload, BackendError> {
        self.record(format!("post_query:{}", text));
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        pop(&self.queries).unwrap_or_else(|| Ok(QueryPayload::direct("ok")))
    }

    async fn request_tool_creation(
        &self,
        _session: &SessionId,
        query: &str,
    ) -> Result<ToolVerdict, BackendError> {
        self.record(format!("request_tool_creation:{}", query));
        pop(&self.verdicts).unwrap_or_else(|| Ok(ToolVerdict::Accepted(json!("created"))))
    }

    async fn create_tool(
        &self,
        _session: &SessionId,
        draft: &ToolDraft,
    ) -> Result<(), BackendError> {
        self.record(format!("create_tool:{}", draft.name));
        Ok(())
    }

    async fn list_tools(&self, _session: &SessionId) -> Result<Vec<CustomTool>, BackendError> {
        Ok(self
            .calls_to("create_tool")
            .into_iter()
            .enumerate()
            .map(|(i, name)| CustomTool {
                id: i.to_string(),
                name,
                description: None,
                code: None,
            })
            .collect())
    }

    async fn delete_tool(&self, _session: &SessionId, tool_id: &str) -> Result<(), BackendError> {
        self.record(format!("delete_tool:{}", tool_id));
        Ok(())
    }

    async fn upload_file(
        &self,
        _session: &SessionId,
        file: &FileUpload,
    ) -> Result<StoredFile, BackendError> {
        self.record(format!("upload_file:{}", file.name));
        tokio::task::yield_now().await;
        pop(&self.uploads).unwrap_or_else(|| {
            Ok(StoredFile {
                filename: format!("stored-{}", file.name),
                file_url: None,
            })
        })
    }

    async fn register_file(
        &self,
        _session: &SessionId,
        stored: &StoredFile,
        _original_name: &str,
    ) -> Result<Option<String>, BackendError> {
        Ok(Some(format!("id-{}", stored.filename)))
    }

    async fn delete_file(&self, _session: &SessionId, file_id: &str) -> Result<(), BackendError> {
        self.record(format!("delete_file:{}", file_id));
        pop(&self.deletes).unwrap_or(Ok(()))
    }

    async fn list_files(&self, _session: &SessionId) -> Result<Vec<FileRecord>, BackendError> {
        Ok(vec![FileRecord {
            id: "f1".to_string(),
            filename: "report.pdf".to_string(),
            original_filename: Some("report.pdf".to_string()),
        }])
    }

    async fn fetch_conversations(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ConversationPair>, BackendError> {
        self.record(format!("fetch_conversations:{}", session));
        Ok(self.history.lock().unwrap().clone())
    }

    async fn post_feedback(
        &self,
        _session: &SessionId,
        request: &FeedbackRequest,
    ) -> Result<String, BackendError> {
        self.feedback_requests.lock().unwrap().push(request.clone());
        if self.gated.load(Ordering::SeqCst) {
            self.gate.notified().await;
        }
        pop(&self.feedback).unwrap_or_else(|| Ok("revised answer".to_string()))
    }
}

fn controller(backend: &Arc<FakeBackend>) -> ChatController<FakeBackend> {
    ChatController::new(Arc::clone(backend), ControllerSettings::default())
}

fn gap_payload() -> QueryPayload {
    QueryPayload {
        missing_capability: Some(true),
        needs_review: Some(false),
        final_answer: json!(""),
    }
}

fn draft() -> ToolDraft {
    ToolDraft::new("currency_convert").with_code("def convert(amount, rate): return amount * rate")
}

// ─────────────────────────────────────────────────────────────────────────────
// Queries
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_direct_answer_installs_text_and_arms_nothing() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(QueryPayload::direct("Paris")));
    let chat = controller(&backend);

    let outcome = chat
        .submit_query("What is the capital of France?")
        .await
        .unwrap();

    assert_eq!(outcome.kind(), "direct");
    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Paris");
    assert!(!messages[0].is_loading);
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "What is the capital of France?");
    assert!(chat.armed_feedback().is_none());
    assert_eq!(chat.reflexion_state(), ReflexionState::Idle);
}

#[tokio::test]
async fn test_needs_review_arms_feedback_with_locked_jargon() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(QueryPayload {
        missing_capability: Some(false),
        needs_review: Some(true),
        final_answer: json!(["x", {"func_response": "42", "jargon": [{"word": "GDP", "meaning": ""}]}]),
    }));
    let chat = controller(&backend);

    chat.submit_query("What was GDP growth?").await.unwrap();

    let messages = chat.messages();
    assert_eq!(messages[0].content, "Current RAG response : 42");
    let form = chat.armed_feedback().expect("feedback should be armed");
    assert_eq!(form.target, messages[0].id);
    assert_eq!(
        form.items,
        vec![ClarificationItem {
            word: "GDP".to_string(),
            meaning: String::new(),
            is_pre_filled: true,
        }]
    );
    assert!(matches!(
        chat.with_feedback_form(|f| f.set_word(0, "GNP")),
        Err(ChatError::WordLocked(_))
    ));
}

#[tokio::test]
async fn test_capability_gap_uses_fallback_and_parks_query() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    let chat = controller(&backend);

    let outcome = chat.submit_query("Convert 10 USD to EUR").await.unwrap();

    assert!(outcome.is_capability_gap());
    assert_eq!(chat.messages()[0].content, CAPABILITY_GAP_FALLBACK);
    assert_eq!(
        chat.pending_rerun_query().as_deref(),
        Some("Convert 10 USD to EUR")
    );
    assert!(chat.reflexion_state().is_form_open());
}

#[tokio::test]
async fn test_transport_failure_replaces_placeholder_with_generic_message() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Err(network()));
    let chat = controller(&backend);

    let err = chat.submit_query("hello").await.unwrap_err();

    assert!(matches!(err, ChatError::Transport(BackendError::Network(_))));
    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, TRANSPORT_FAILURE_MESSAGE);
    assert_eq!(messages[1].content, "hello");
    assert!(messages.iter().all(|m| !m.is_loading));

    // the timeline accepts the next query
    chat.submit_query("again").await.unwrap();
}

#[tokio::test]
async fn test_second_query_rejected_while_first_pending() {
    let backend = Arc::new(FakeBackend::default());
    backend.gated.store(true, Ordering::SeqCst);
    let chat = controller(&backend);

    let (first, second) = tokio::join!(chat.submit_query("one"), async {
        tokio::task::yield_now().await;
        let result = chat.submit_query("two").await;
        backend.gate.notify_one();
        result
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), ChatError::QueryInFlight);
    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages.iter().filter(|m| m.is_loading).count(), 0);
    assert_eq!(backend.calls_to("post_query"), vec!["one"]);
}

#[tokio::test]
async fn test_empty_query_is_refused() {
    let backend = Arc::new(FakeBackend::default());
    let chat = controller(&backend);
    assert_eq!(chat.submit_query("   ").await.unwrap_err(), ChatError::EmptyQuery);
    assert!(chat.messages().is_empty());
    assert!(backend.calls_to("create_session").is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool reflexion
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_name_invalid_then_success_reruns_into_slot() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    backend.script_query(Ok(QueryPayload::direct("10 USD = 9.2 EUR")));
    backend
        .verdicts
        .lock()
        .unwrap()
        .extend([Ok(ToolVerdict::NameInvalid), Ok(ToolVerdict::Accepted(json!(1)))]);
    let chat = controller(&backend);

    chat.submit_query("Convert 10 USD to EUR").await.unwrap();
    let slot = chat.messages()[0].id;

    let err = chat.submit_tool_draft(draft()).await.unwrap_err();
    assert_eq!(err, ChatError::Rejected(DraftField::Name));
    assert_eq!(chat.messages()[0].content, NAME_INVALID_PROMPT);
    assert_eq!(chat.reflexion_state().flagged_field(), Some(DraftField::Name));
    assert_eq!(
        chat.pending_rerun_query().as_deref(),
        Some("Convert 10 USD to EUR")
    );

    let result = chat.submit_tool_draft(draft()).await.unwrap();
    assert!(matches!(result, ToolSubmission::Rerun(Outcome::Direct { .. })));

    let messages = chat.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id, slot);
    assert_eq!(messages[0].content, "10 USD = 9.2 EUR");
    assert!(!messages[0].is_loading);
    assert_eq!(chat.pending_rerun_query(), None);
    assert_eq!(
        backend.calls_to("request_tool_creation"),
        vec!["Convert 10 USD to EUR", "Convert 10 USD to EUR"]
    );
    assert_eq!(chat.tools().len(), 2);
}

#[tokio::test]
async fn test_invalid_draft_makes_no_call() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    let chat = controller(&backend);
    chat.submit_query("q").await.unwrap();

    let err = chat
        .submit_tool_draft(ToolDraft::new("convert"))
        .await
        .unwrap_err();

    assert_eq!(err, ChatError::InvalidDraft(DraftProblem::MissingBody));
    assert!(backend.calls_to("create_tool").is_empty());
    assert!(chat.reflexion_state().is_form_open());
}

#[tokio::test]
async fn test_tool_transport_failure_closes_form_and_keeps_query() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    backend.verdicts.lock().unwrap().push_back(Err(network()));
    let chat = controller(&backend);
    chat.submit_query("q").await.unwrap();

    assert!(chat.submit_tool_draft(draft()).await.is_err());
    assert_eq!(chat.messages()[0].content, TRANSPORT_FAILURE_MESSAGE);
    assert!(matches!(
        chat.reflexion_state(),
        ReflexionState::Closed {
            reason: CloseReason::TransportError,
            ..
        }
    ));
    assert_eq!(
        chat.submit_tool_draft(draft()).await.unwrap_err(),
        ChatError::DraftFormClosed
    );

    chat.reopen_tool_draft().unwrap();
    assert!(chat.reflexion_state().is_form_open());
    assert_eq!(chat.pending_rerun_query().as_deref(), Some("q"));
}

#[tokio::test]
async fn test_decline_appends_message_and_reopen_restores_form() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    let chat = controller(&backend);
    chat.submit_query("q").await.unwrap();

    chat.decline_tool_draft().unwrap();
    assert_eq!(chat.messages()[0].content, DECLINED_MESSAGE);
    assert!(!chat.reflexion_state().is_form_open());
    assert_eq!(chat.decline_tool_draft(), Err(ChatError::DraftFormClosed));

    chat.reopen_tool_draft().unwrap();
    assert!(chat.reflexion_state().is_form_open());
    assert_eq!(chat.pending_rerun_query().as_deref(), Some("q"));
}

#[tokio::test]
async fn test_draft_while_idle_only_registers() {
    let backend = Arc::new(FakeBackend::default());
    let chat = controller(&backend);

    let result = chat.submit_tool_draft(draft()).await.unwrap();

    assert_eq!(result, ToolSubmission::Registered);
    assert!(backend.calls_to("request_tool_creation").is_empty());
    assert!(backend.calls_to("post_query").is_empty());
    assert_eq!(chat.tools()[0].name, "currency_convert");
    assert!(chat.messages().is_empty());
}

#[tokio::test]
async fn test_gap_slot_blocks_new_queries_while_submitting() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    backend.gated.store(true, Ordering::SeqCst);
    let chat = controller(&backend);

    let (gap, _) = tokio::join!(chat.submit_query("q"), async {
        tokio::task::yield_now().await;
        backend.gate.notify_one();
    });
    gap.unwrap();

    let (submitted, blocked) = tokio::join!(chat.submit_tool_draft(draft()), async {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let blocked = chat.submit_query("other").await;
        backend.gate.notify_one();
        blocked
    });

    assert!(submitted.is_ok());
    assert_eq!(blocked.unwrap_err(), ChatError::QueryInFlight);
}

#[tokio::test]
async fn test_tool_added_notice_shown_during_rerun() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    let chat = ChatController::new(
        Arc::clone(&backend),
        ControllerSettings {
            tool_added_notice: true,
        },
    );
    chat.submit_query("q").await.unwrap();
    backend.gated.store(true, Ordering::SeqCst);

    let (submitted, during) = tokio::join!(chat.submit_tool_draft(draft()), async {
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        let during = chat.messages()[0].clone();
        backend.gate.notify_one();
        during
    });

    submitted.unwrap();
    assert!(during.is_loading);
    assert_eq!(during.content, super::reflexion::TOOL_ADDED_NOTICE);
    assert_eq!(chat.messages()[0].content, "ok");
}

#[tokio::test]
async fn test_rerun_needing_review_arms_feedback_on_slot() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    backend.script_query(Ok(QueryPayload {
        missing_capability: Some(false),
        needs_review: Some(true),
        final_answer: json!(["x", {"func_response": "9.2 EUR", "jargon": [{"word": "FX", "meaning": "foreign exchange"}]}]),
    }));
    let chat = controller(&backend);
    chat.submit_query("Convert 10 USD to EUR").await.unwrap();
    let slot = chat.messages()[0].id;

    let result = chat.submit_tool_draft(draft()).await.unwrap();

    assert!(matches!(
        result,
        ToolSubmission::Rerun(Outcome::NeedsReview { .. })
    ));
    assert_eq!(chat.messages()[0].content, "Current RAG response : 9.2 EUR");
    let form = chat.armed_feedback().expect("review arms the form");
    assert_eq!(form.target, slot);
    assert_eq!(
        form.items,
        vec![ClarificationItem {
            word: "FX".to_string(),
            meaning: "foreign exchange".to_string(),
            is_pre_filled: true,
        }]
    );
    assert_eq!(chat.reflexion_state(), ReflexionState::Idle);
    assert_eq!(chat.pending_rerun_query(), None);
}

#[tokio::test]
async fn test_gap_with_review_parks_query_without_arming_feedback() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(QueryPayload {
        missing_capability: Some(true),
        needs_review: Some(true),
        final_answer: json!(["x", {"func_response": "1"}]),
    }));
    let chat = controller(&backend);

    let outcome = chat.submit_query("Convert 10 USD to EUR").await.unwrap();

    assert!(matches!(outcome, Outcome::CapabilityGapWithReview { .. }));
    let slot = chat.messages()[0].id;
    assert_eq!(chat.reflexion_state().slot(), Some(slot));
    assert!(chat.reflexion_state().is_form_open());
    assert_eq!(
        chat.pending_rerun_query().as_deref(),
        Some("Convert 10 USD to EUR")
    );
    assert!(chat.armed_feedback().is_none());
}

#[tokio::test]
async fn test_rerun_answer_is_appended_to_backend_history() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    backend.script_query(Ok(QueryPayload::direct("10 USD = 9.2 EUR")));
    let chat = controller(&backend);
    chat.submit_query("Convert 10 USD to EUR").await.unwrap();

    chat.submit_tool_draft(draft()).await.unwrap();
    // persistence is fire-and-forget
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let posted = backend.calls_to("post_message");
    assert_eq!(posted.last().map(String::as_str), Some("assistant:10 USD = 9.2 EUR"));
    assert_eq!(chat.messages().len(), 2);
}

// ─────────────────────────────────────────────────────────────────────────────
// Feedback
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_detailed_feedback_filters_blank_clarifications() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(QueryPayload::direct("GDP grew 3%")));
    let chat = controller(&backend);
    chat.submit_query("How did GDP change?").await.unwrap();
    let answer = chat.messages()[0].id;

    chat.submit_feedback(FeedbackAction::Coarse {
        message: answer,
        feedback: Feedback::Negative,
    })
    .await
    .unwrap();
    assert_eq!(chat.messages()[0].feedback, Some(Feedback::Negative));

    chat.with_feedback_form(|form| {
        form.set_word(0, "GDP")?;
        form.set_meaning(0, "gross domestic product")?;
        let blank_meaning = form.add_item();
        form.set_word(blank_meaning, "CPI")?;
        form.add_item();
        Ok(())
    })
    .unwrap();

    let receipt = chat
        .submit_feedback(FeedbackAction::Detailed {
            feedback_text: "use real GDP".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(
        receipt,
        FeedbackReceipt::Revised {
            message: answer,
            content: "revised answer".to_string(),
        }
    );
    let requests = backend.feedback_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].query, "How did GDP change?");
    assert!(requests[0].re_evaluate);
    assert_eq!(requests[0].clarification.len(), 1);
    assert_eq!(requests[0].clarification[0].word, "GDP");
    assert_eq!(chat.messages()[0].content, "revised answer");
    assert!(chat.armed_feedback().is_none());
}

#[tokio::test]
async fn test_feedback_failure_keeps_form_and_message() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(QueryPayload::direct("answer")));
    backend.feedback.lock().unwrap().push_back(Err(network()));
    let chat = controller(&backend);
    chat.submit_query("q").await.unwrap();
    let answer = chat.messages()[0].id;

    chat.submit_feedback(FeedbackAction::Coarse {
        message: answer,
        feedback: Feedback::Positive,
    })
    .await
    .unwrap();
    let result = chat
        .submit_feedback(FeedbackAction::Detailed {
            feedback_text: "good".to_string(),
        })
        .await;

    assert!(matches!(result, Err(ChatError::Transport(_))));
    assert_eq!(chat.messages()[0].content, "answer");
    let form = chat.armed_feedback().expect("form stays open");
    assert_eq!(form.target, answer);
    assert!(!form.re_evaluate());
}

#[tokio::test]
async fn test_gap_slot_stays_settled_while_feedback_in_flight() {
    let backend = Arc::new(FakeBackend::default());
    backend.script_query(Ok(gap_payload()));
    let chat = controller(&backend);
    chat.submit_query("Convert 10 USD to EUR").await.unwrap();
    let slot = chat.messages()[0].id;
    chat.submit_feedback(FeedbackAction::Coarse {
        message: slot,
        feedback: Feedback::Negative,
    })
    .await
    .unwrap();
    backend.gated.store(true, Ordering::SeqCst);

    let (revised, (tool, again, rating)) = tokio::join!(
        chat.submit_feedback(FeedbackAction::Detailed {
            feedback_text: "needs a converter".to_string(),
        }),
        async {
            tokio::task::yield_now().await;
            let tool = chat.submit_tool_draft(draft()).await;
            let again = chat
                .submit_feedback(FeedbackAction::Detailed {
                    feedback_text: "twice".to_string(),
                })
                .await;
            let rating = chat
                .submit_feedback(FeedbackAction::Coarse {
                    message: slot,
                    feedback: Feedback::Positive,
                })
                .await;
            backend.gate.notify_one();
            (tool, again, rating)
        }
    );

    assert_eq!(tool.unwrap_err(), ChatError::FeedbackInFlight(slot));
    assert_eq!(again.unwrap_err(), ChatError::FeedbackInFlight(slot));
    assert_eq!(rating.unwrap_err(), ChatError::FeedbackInFlight(slot));
    assert_eq!(
        revised.unwrap(),
        FeedbackReceipt::Revised {
            message: slot,
            content: "revised answer".to_string(),
        }
    );
    assert_eq!(chat.messages()[0].content, "revised answer");
    assert_eq!(chat.messages()[0].feedback, Some(Feedback::Negative));
    assert!(chat.armed_feedback().is_none());
    assert_eq!(backend.feedback_requests.lock().unwrap().len(), 1);
    assert!(backend.calls_to("create_tool").is_empty());

    // the draft form survives and the slot can be re-run afterwards
    assert!(chat.reflexion_state().is_form_open());
    backend.gated.store(false, Ordering::SeqCst);
    let result = chat.submit_tool_draft(draft()).await.unwrap();
    assert!(matches!(result, ToolSubmission::Rerun(Outcome::Direct { .. })));
}

#[tokio::test]
async fn test_only_settled_assistant_messages_are_rateable() {
    let backend = Arc::new(FakeBackend::default());
    let chat = controller(&backend);
    chat.submit_query("q").await.unwrap();
    let user = chat.messages()[1].id;

    let err = chat
        .submit_feedback(FeedbackAction::Coarse {
            message: user,
            feedback: Feedback::Positive,
        })
        .await
        .unwrap_err();
    assert_eq!(err, ChatError::NotRateable(user));

    let err = chat
        .submit_feedback(FeedbackAction::Detailed {
            feedback_text: "x".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err, ChatError::NotArmed);
    assert!(!chat.dismiss_feedback());
}

// ─────────────────────────────────────────────────────────────────────────────
// Attachments and session
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_upload_failure_adds_nothing_and_clears_indicator() {
    let backend = Arc::new(FakeBackend::default());
    backend.uploads.lock().unwrap().push_back(Err(network()));
    let chat = controller(&backend);

    let uploaded = chat
        .upload_file(FileUpload::new("report.pdf", b"%PDF".to_vec()))
        .await;

    assert!(uploaded.is_none());
    assert!(chat.attachments().is_empty());
    assert!(chat.uploading().is_empty());
}

#[tokio::test]
async fn test_concurrent_uploads_share_one_session() {
    let backend = Arc::new(FakeBackend::default());
    let chat = controller(&backend);

    let uploaded = chat
        .upload_files(vec![
            FileUpload::new("a.pdf", b"a".to_vec()),
            FileUpload::new("b.pdf", b"b".to_vec()),
        ])
        .await;

    assert_eq!(uploaded.len(), 2);
    assert_eq!(backend.calls_to("create_session").len(), 1);
    assert_eq!(chat.session_id(), Some(SessionId::new("s1")));
    assert_eq!(chat.attachments().len(), 2);
    assert!(chat.uploading().is_empty());
}

#[tokio::test]
async fn test_remove_failure_leaves_list_unchanged() {
    let backend = Arc::new(FakeBackend::default());
    backend.deletes.lock().unwrap().push_back(Err(network()));
    let chat = controller(&backend);
    chat.upload_file(FileUpload::new("a.pdf", b"a".to_vec()))
        .await
        .unwrap();

    assert!(chat.remove_file(0).await.is_err());
    assert_eq!(chat.attachments().len(), 1);

    assert!(chat.remove_file(0).await.unwrap());
    assert!(chat.attachments().is_empty());
    assert_eq!(
        backend.calls_to("delete_file"),
        vec!["id-stored-a.pdf", "id-stored-a.pdf"]
    );

    // absent entry: no call
    assert!(!chat.remove_file(0).await.unwrap());
    assert_eq!(backend.calls_to("delete_file").len(), 2);
}

#[tokio::test]
async fn test_lazy_session_is_created_once_with_truncated_title() {
    let backend = Arc::new(FakeBackend::default());
    let chat = controller(&backend);
    let long = "x".repeat(80);

    chat.submit_query(&long).await.unwrap();
    chat.submit_query("second").await.unwrap();

    let created = backend.calls_to("create_session");
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].chars().count(), 50);
    assert_eq!(chat.title().map(|t| t.len()), Some(50));
}

#[tokio::test]
async fn test_resume_seeds_files_and_loads_history_once() {
    let backend = Arc::new(FakeBackend::default());
    backend
        .history
        .lock()
        .unwrap()
        .push(ConversationPair("old q".to_string(), "old a".to_string()));
    let chat = controller(&backend);

    chat.resume(SessionId::new("s9")).await.unwrap();
    assert_eq!(chat.title().as_deref(), Some("Quarterly numbers"));
    assert_eq!(chat.attachments()[0].storage_id.as_deref(), Some("f1"));
    assert_eq!(
        chat.resume(SessionId::new("s9")).await.unwrap_err(),
        ChatError::SessionAlreadyStarted
    );

    assert_eq!(chat.load_history().await.unwrap(), 1);
    assert_eq!(chat.load_history().await.unwrap(), 1);
    assert_eq!(backend.calls_to("fetch_conversations").len(), 1);

    chat.submit_query("new q").await.unwrap();
    let transcript = chat.transcript();
    let contents: Vec<_> = transcript.iter().map(|e| e.content.as_str()).collect();
    assert_eq!(contents, vec!["ok", "new q", "old a", "old q"]);
    assert!(backend.calls_to("create_session").is_empty());
}

#[tokio::test]
async fn test_events_follow_transitions() {
    let backend = Arc::new(FakeBackend::default());
    let (tx, mut rx) = tokio::sync::mpsc::channel(16);
    let chat = controller(&backend).with_events(tx);

    chat.submit_query("q").await.unwrap();
    drop(chat);

    let mut kinds = Vec::new();
    while let Some(event) = rx.recv().await {
        kinds.push(serde_json::to_value(&event).unwrap()["type"].clone());
    }
    assert_eq!(
        kinds,
        vec![
            json!("query_submitted"),
            json!("session_started"),
            json!("query_resolved")
        ]
    );
}
