//! Conversation session controller
//!
//! [`ChatController`] owns the message timeline, the attachment list and the
//! two sub-controllers (tool reflexion and detailed feedback). All state
//! sits behind one short-lived lock that is never held across a backend
//! call; every transition is applied in a single critical section.
//!
//! # Flow
//!
//! ```text
//! submit_query ─▶ timeline.append_pending ─▶ backend.post_query ─▶ resolver::resolve
//!                                                                     │
//!            ┌────────────────────┬──────────────────────────────────┤
//!            ▼                    ▼                                  ▼
//!         Direct          CapabilityGap(*)                      NeedsReview
//!                     arm ReflexionState::AwaitingDraft     arm FeedbackForm
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, OnceCell};

use crate::backend::{
    BackendError, ChatBackend, CustomTool, FeedbackRequest, FileUpload, SessionId,
    SessionSummary, ToolVerdict,
};
use crate::events::ChatEvent;

pub mod attachments;
mod error;
pub mod feedback;
pub mod reflexion;
pub mod resolver;
pub mod session;
pub mod timeline;

#[cfg(test)]
mod tests;

pub use attachments::{AttachmentManager, InFlightUpload, UploadTicket, UploadedFile};
pub use error::ChatError;
pub use feedback::{ClarificationItem, FeedbackForm, FeedbackSubmission};
pub use reflexion::{CloseReason, DraftField, DraftProblem, ReflexionState, ToolDraft};
pub use resolver::{resolve, Outcome};
pub use session::{DisplayEntry, HistoryState};
pub use timeline::{Feedback, Message, MessageId, MessageTimeline, Role};

use reflexion::{CREATING_TOOL_PLACEHOLDER, DECLINED_MESSAGE, TOOL_ADDED_NOTICE};

/// Terminal text installed when a query or tool re-run fails in transport
pub const TRANSPORT_FAILURE_MESSAGE: &str =
    "Sorry, there was an error generating the response. Please try again.";

/// Behavior switches (from `[features]` in the config file)
#[derive(Debug, Clone, Copy, Default)]
pub struct ControllerSettings {
    /// Show "Tool added successfully..." in the slot before the re-run
    pub tool_added_notice: bool,
}

/// Feedback input from the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum FeedbackAction {
    /// Thumbs rating; recorded locally and arms the detailed form
    Coarse {
        message: MessageId,
        feedback: Feedback,
    },
    /// Submit the armed form with this free text
    Detailed { feedback_text: String },
}

/// Result of a successful feedback action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FeedbackReceipt {
    Rated(MessageId),
    /// Target message now holds `content`
    Revised { message: MessageId, content: String },
}

/// Result of a successful tool draft submission
#[derive(Debug, Clone, PartialEq)]
pub enum ToolSubmission {
    /// Tool registered; nothing was waiting for it
    Registered,
    /// Tool registered and the parked query re-run into its slot
    Rerun(Outcome),
}

#[derive(Debug, Default)]
struct ControllerState {
    timeline: MessageTimeline,
    attachments: AttachmentManager,
    reflexion: ReflexionState,
    feedback: Option<FeedbackForm>,
    tools: Vec<CustomTool>,
    history: HistoryState,
    title: Option<String>,
}

/// Session controller, shared by reference between concurrent operations
pub struct ChatController<B: ChatBackend + 'static> {
    backend: Arc<B>,
    session: OnceCell<SessionId>,
    state: Mutex<ControllerState>,
    settings: ControllerSettings,
    events: Option<mpsc::Sender<ChatEvent>>,
}

impl<B: ChatBackend + 'static> ChatController<B> {
    /// Controller for a session that will be created on first use
    pub fn new(backend: Arc<B>, settings: ControllerSettings) -> Self {
        Self {
            backend,
            session: OnceCell::new(),
            state: Mutex::new(ControllerState::default()),
            settings,
            events: None,
        }
    }

    /// Emit a [`ChatEvent`] for every visible transition
    pub fn with_events(mut self, events: mpsc::Sender<ChatEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn emit(&self, event: ChatEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event).await;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Session bootstrap
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach to an existing session: title, files and tools are loaded.
    ///
    /// Only the snapshot is required; file and tool listing failures are
    /// logged and leave those lists empty.
    pub async fn resume(&self, session_id: SessionId) -> Result<(), ChatError> {
        let snapshot = self.backend.fetch_session(&session_id).await?;
        self.session
            .set(session_id.clone())
            .map_err(|_| ChatError::SessionAlreadyStarted)?;

        let files = self.backend.list_files(&session_id).await;
        let tools = self.backend.list_tools(&session_id).await;
        {
            let mut state = self.lock();
            state.title = Some(snapshot.title.clone());
            match files {
                Ok(records) => state.attachments.seed(records),
                Err(e) => tracing::warn!("Failed to list files for {}: {}", session_id, e),
            }
            match tools {
                Ok(tools) => state.tools = tools,
                Err(e) => tracing::warn!("Failed to list tools for {}: {}", session_id, e),
            }
        }

        tracing::info!("Resumed session {} ({})", session_id, snapshot.title);
        self.emit(ChatEvent::SessionStarted {
            timestamp: Utc::now(),
            session_id,
            title: Some(snapshot.title),
            resumed: true,
        })
        .await;
        Ok(())
    }

    /// Session identity, creating it on first call.
    ///
    /// Concurrent callers share a single create request.
    async fn ensure_session(&self, title_source: &str) -> Result<SessionId, ChatError> {
        let id = self
            .session
            .get_or_try_init(|| async {
                let title = session::session_title(title_source);
                let summary = self.backend.create_session(&title).await?;
                tracing::info!("Created session {} ({})", summary.id, summary.title);

                self.lock().title = Some(summary.title.clone());
                self.emit(ChatEvent::SessionStarted {
                    timestamp: Utc::now(),
                    session_id: summary.id.clone(),
                    title: Some(summary.title),
                    resumed: false,
                })
                .await;
                Ok::<_, BackendError>(summary.id)
            })
            .await?;
        Ok(id.clone())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.get().cloned()
    }

    pub fn title(&self) -> Option<String> {
        self.lock().title.clone()
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ChatError> {
        Ok(self.backend.list_sessions().await?)
    }

    /// Fetch the read-only history once per session identity.
    ///
    /// Returns the number of historical pairs available.
    pub async fn load_history(&self) -> Result<usize, ChatError> {
        let session = self.session_id().ok_or(ChatError::NoSession)?;
        {
            let mut state = self.lock();
            if state.history.covers(&session) {
                return Ok(state.history.pairs().len());
            }
            state.history = HistoryState::Loading(session.clone());
        }

        match self.backend.fetch_conversations(&session).await {
            Ok(pairs) => {
                let count = pairs.len();
                self.lock().history = HistoryState::Loaded { session, pairs };
                tracing::debug!("Loaded {} historical pairs", count);
                Ok(count)
            }
            Err(e) => {
                self.lock().history = HistoryState::NotLoaded;
                Err(e.into())
            }
        }
    }

    /// Persist a message in the background; failures are only logged
    fn persist(&self, session: &SessionId, role: Role, content: String) {
        let backend = Arc::clone(&self.backend);
        let session = session.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.post_message(&session, role, &content).await {
                tracing::warn!("Failed to persist {} message: {}", role, e);
            }
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Send a query and install the classified answer.
    ///
    /// Rejected with [`ChatError::QueryInFlight`] while any message is
    /// loading. On transport failure the placeholder is replaced by one
    /// generic assistant message and the error is returned.
    pub async fn submit_query(&self, text: &str) -> Result<Outcome, ChatError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        let pair = self
            .lock()
            .timeline
            .append_pending(text)
            .ok_or(ChatError::QueryInFlight)?;
        tracing::debug!("Query submitted as message {}", pair.user);
        self.emit(ChatEvent::QuerySubmitted {
            timestamp: Utc::now(),
            message_id: pair.user,
            text: text.to_string(),
        })
        .await;

        let session = match self.ensure_session(text).await {
            Ok(session) => session,
            Err(e) => return Err(self.fail_query(e).await),
        };
        self.persist(&session, Role::User, text.to_string());

        let payload = match self.backend.post_query(&session, text).await {
            Ok(payload) => payload,
            Err(e) => return Err(self.fail_query(e.into()).await),
        };

        let outcome = resolve(&payload);
        let slot = {
            let mut state = self.lock();
            let slot = state
                .timeline
                .resolve_pending(outcome.text())
                .ok_or(ChatError::UnknownMessage(pair.placeholder))?;
            apply_outcome(&mut state, slot, text, &outcome);
            slot
        };
        tracing::debug!("Message {} resolved as {}", slot, outcome.kind());

        self.persist(&session, Role::Assistant, outcome.text().to_string());
        self.emit(ChatEvent::QueryResolved {
            timestamp: Utc::now(),
            message_id: slot,
            outcome: outcome.clone(),
        })
        .await;
        Ok(outcome)
    }

    async fn fail_query(&self, err: ChatError) -> ChatError {
        {
            let mut state = self.lock();
            state.timeline.discard_pending();
            state.timeline.push_assistant(TRANSPORT_FAILURE_MESSAGE);
        }
        tracing::warn!("Query failed: {}", err);
        self.emit(ChatEvent::QueryFailed {
            timestamp: Utc::now(),
            error: err.to_string(),
        })
        .await;
        err
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tool reflexion
    // ─────────────────────────────────────────────────────────────────────────

    /// Submit a tool draft.
    ///
    /// With a parked query, the slot turns into the loading element while the
    /// tool is registered and validated; on acceptance the query is re-run
    /// into the same slot. Without one, the tool is only registered.
    pub async fn submit_tool_draft(&self, draft: ToolDraft) -> Result<ToolSubmission, ChatError> {
        draft.validate()?;

        let parked = {
            let mut state = self.lock();
            match state.reflexion.clone() {
                ReflexionState::Idle => None,
                ReflexionState::AwaitingDraft {
                    rerun_query, slot, ..
                } => {
                    // the slot must stay settled until its feedback answer lands
                    if state.feedback.as_ref().is_some_and(|f| f.is_submitting_for(slot)) {
                        return Err(ChatError::FeedbackInFlight(slot));
                    }
                    if !state.timeline.reopen_pending(slot, CREATING_TOOL_PLACEHOLDER) {
                        return Err(ChatError::QueryInFlight);
                    }
                    state.reflexion = ReflexionState::Submitting {
                        rerun_query: rerun_query.clone(),
                        slot,
                    };
                    Some((rerun_query, slot))
                }
                ReflexionState::Submitting { .. } => {
                    return Err(ChatError::ToolSubmissionInFlight)
                }
                ReflexionState::Closed { .. } => return Err(ChatError::DraftFormClosed),
            }
        };

        self.emit(ChatEvent::ToolDraftSubmitted {
            timestamp: Utc::now(),
            name: draft.name.trim().to_string(),
        })
        .await;

        match parked {
            None => self.register_tool(&draft).await,
            Some((query, slot)) => self.register_and_rerun(&draft, query, slot).await,
        }
    }

    async fn register_tool(&self, draft: &ToolDraft) -> Result<ToolSubmission, ChatError> {
        let session = self.ensure_session(draft.name.trim()).await?;
        self.backend.create_tool(&session, draft).await?;
        tracing::info!("Registered tool '{}'", draft.name.trim());

        self.reload_tools(&session).await;
        self.emit(ChatEvent::ToolAccepted {
            timestamp: Utc::now(),
            name: draft.name.trim().to_string(),
            rerun: false,
        })
        .await;
        Ok(ToolSubmission::Registered)
    }

    async fn register_and_rerun(
        &self,
        draft: &ToolDraft,
        query: String,
        slot: MessageId,
    ) -> Result<ToolSubmission, ChatError> {
        let verdict = async {
            let session = self.ensure_session(&query).await?;
            self.backend.create_tool(&session, draft).await?;
            let verdict = self.backend.request_tool_creation(&session, &query).await?;
            Ok::<_, ChatError>((session, verdict))
        }
        .await;

        let session = match verdict {
            Ok((session, ToolVerdict::Accepted(_))) => session,
            Ok((_, ToolVerdict::NameInvalid)) => {
                return Err(self.reject_draft(query, slot, DraftField::Name).await)
            }
            Ok((_, ToolVerdict::DocInvalid)) => {
                return Err(self.reject_draft(query, slot, DraftField::Docstring).await)
            }
            Err(e) => {
                {
                    let mut state = self.lock();
                    state.timeline.resolve_pending(TRANSPORT_FAILURE_MESSAGE);
                    state.reflexion = ReflexionState::Closed {
                        rerun_query: query,
                        slot,
                        reason: CloseReason::TransportError,
                    };
                }
                tracing::warn!("Tool submission failed: {}", e);
                self.emit(ChatEvent::QueryFailed {
                    timestamp: Utc::now(),
                    error: e.to_string(),
                })
                .await;
                return Err(e);
            }
        };

        {
            let mut state = self.lock();
            state.reflexion = ReflexionState::Idle;
            if self.settings.tool_added_notice {
                state.timeline.set_pending_text(TOOL_ADDED_NOTICE);
            }
        }
        tracing::info!("Tool '{}' accepted, re-running query", draft.name.trim());
        self.emit(ChatEvent::ToolAccepted {
            timestamp: Utc::now(),
            name: draft.name.trim().to_string(),
            rerun: true,
        })
        .await;
        self.reload_tools(&session).await;

        let payload = match self.backend.post_query(&session, &query).await {
            Ok(payload) => payload,
            Err(e) => {
                self.lock()
                    .timeline
                    .resolve_pending(TRANSPORT_FAILURE_MESSAGE);
                tracing::warn!("Re-run failed: {}", e);
                self.emit(ChatEvent::QueryFailed {
                    timestamp: Utc::now(),
                    error: e.to_string(),
                })
                .await;
                return Err(e.into());
            }
        };

        let outcome = resolve(&payload);
        {
            let mut state = self.lock();
            state.timeline.resolve_pending(outcome.text());
            apply_outcome(&mut state, slot, &query, &outcome);
        }
        self.persist(&session, Role::Assistant, outcome.text().to_string());
        self.emit(ChatEvent::QueryResolved {
            timestamp: Utc::now(),
            message_id: slot,
            outcome: outcome.clone(),
        })
        .await;
        Ok(ToolSubmission::Rerun(outcome))
    }

    async fn reject_draft(&self, query: String, slot: MessageId, field: DraftField) -> ChatError {
        {
            let mut state = self.lock();
            state.timeline.resolve_pending(field.prompt());
            state.reflexion = ReflexionState::AwaitingDraft {
                rerun_query: query,
                slot,
                flagged: Some(field),
            };
        }
        tracing::debug!("Tool draft rejected: {}", field);
        self.emit(ChatEvent::ToolRejected {
            timestamp: Utc::now(),
            field,
        })
        .await;
        ChatError::Rejected(field)
    }

    /// Close the draft form without a tool; the parked query is kept
    pub fn decline_tool_draft(&self) -> Result<(), ChatError> {
        let mut state = self.lock();
        match state.reflexion.clone() {
            ReflexionState::AwaitingDraft {
                rerun_query, slot, ..
            } => {
                if state.timeline.has_pending() {
                    return Err(ChatError::QueryInFlight);
                }
                state.reflexion = ReflexionState::Closed {
                    rerun_query,
                    slot,
                    reason: CloseReason::Declined,
                };
                state.timeline.push_assistant(DECLINED_MESSAGE);
                tracing::debug!("Tool draft declined");
                Ok(())
            }
            ReflexionState::Idle => Err(ChatError::NotArmed),
            ReflexionState::Submitting { .. } => Err(ChatError::ToolSubmissionInFlight),
            ReflexionState::Closed { .. } => Err(ChatError::DraftFormClosed),
        }
    }

    /// Re-open a closed draft form for the parked query
    pub fn reopen_tool_draft(&self) -> Result<(), ChatError> {
        let mut state = self.lock();
        match state.reflexion.clone() {
            ReflexionState::Closed {
                rerun_query, slot, ..
            } => {
                state.reflexion = ReflexionState::awaiting(rerun_query, slot);
                Ok(())
            }
            ReflexionState::AwaitingDraft { .. } => Ok(()),
            ReflexionState::Idle => Err(ChatError::NotArmed),
            ReflexionState::Submitting { .. } => Err(ChatError::ToolSubmissionInFlight),
        }
    }

    pub fn reflexion_state(&self) -> ReflexionState {
        self.lock().reflexion.clone()
    }

    pub fn pending_rerun_query(&self) -> Option<String> {
        self.lock()
            .reflexion
            .pending_rerun_query()
            .map(str::to_string)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Custom tools
    // ─────────────────────────────────────────────────────────────────────────

    async fn reload_tools(&self, session: &SessionId) {
        match self.backend.list_tools(session).await {
            Ok(tools) => self.lock().tools = tools,
            Err(e) => tracing::warn!("Failed to refresh tool list: {}", e),
        }
    }

    pub async fn refresh_tools(&self) -> Result<Vec<CustomTool>, ChatError> {
        let session = self.session_id().ok_or(ChatError::NoSession)?;
        let tools = self.backend.list_tools(&session).await?;
        self.lock().tools = tools.clone();
        Ok(tools)
    }

    pub async fn delete_tool(&self, tool_id: &str) -> Result<(), ChatError> {
        let session = self.session_id().ok_or(ChatError::NoSession)?;
        self.backend.delete_tool(&session, tool_id).await?;
        self.lock().tools.retain(|t| t.id != tool_id);
        tracing::info!("Deleted tool {}", tool_id);
        Ok(())
    }

    pub fn tools(&self) -> Vec<CustomTool> {
        self.lock().tools.clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Feedback
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn submit_feedback(
        &self,
        action: FeedbackAction,
    ) -> Result<FeedbackReceipt, ChatError> {
        match action {
            FeedbackAction::Coarse { message, feedback } => {
                self.rate(message, feedback)?;
                self.emit(ChatEvent::FeedbackRated {
                    timestamp: Utc::now(),
                    message_id: message,
                    feedback,
                })
                .await;
                Ok(FeedbackReceipt::Rated(message))
            }
            FeedbackAction::Detailed { feedback_text } => {
                self.submit_detailed(feedback_text).await
            }
        }
    }

    /// Record a rating before any confirmation and arm the form for it
    fn rate(&self, id: MessageId, feedback: Feedback) -> Result<(), ChatError> {
        let mut state = self.lock();
        let message = state
            .timeline
            .get(id)
            .ok_or(ChatError::UnknownMessage(id))?;
        if message.role != Role::Assistant {
            return Err(ChatError::NotRateable(id));
        }
        if message.is_loading {
            return Err(ChatError::MessagePending(id));
        }
        if state.feedback.as_ref().is_some_and(|f| f.is_submitting_for(id)) {
            return Err(ChatError::FeedbackInFlight(id));
        }

        state.timeline.set_feedback(id, feedback);
        state.feedback = Some(FeedbackForm::for_rating(id, feedback.is_positive()));
        tracing::debug!("Message {} rated {:?}", id, feedback);
        Ok(())
    }

    async fn submit_detailed(&self, feedback_text: String) -> Result<FeedbackReceipt, ChatError> {
        let session = self.session_id().ok_or(ChatError::NoSession)?;
        let (target, request) = {
            let mut state = self.lock();
            let ControllerState {
                timeline, feedback, ..
            } = &mut *state;
            let form = feedback.as_mut().ok_or(ChatError::NotArmed)?;
            let target = form.target;
            if form.is_submitting() {
                return Err(ChatError::FeedbackInFlight(target));
            }
            let message = timeline
                .get(target)
                .ok_or(ChatError::UnknownMessage(target))?;
            if message.is_loading {
                return Err(ChatError::MessagePending(target));
            }

            let submission = form.submission(feedback_text);
            let request = FeedbackRequest {
                feedback: submission.feedback_text,
                clarification: submission.clarifications,
                query: timeline
                    .preceding_user_text(target)
                    .unwrap_or_default()
                    .to_string(),
                re_evaluate: form.re_evaluate(),
            };
            form.set_submitting(true);
            (target, request)
        };

        let result = self.backend.post_feedback(&session, &request).await;

        let answer = {
            let mut state = self.lock();
            let ControllerState {
                timeline, feedback, ..
            } = &mut *state;
            let applied = match &result {
                Ok(answer) => timeline.mutate_at(target, answer.clone()),
                Err(_) => false,
            };
            // a form re-armed for another message meanwhile is left alone
            if feedback.as_ref().is_some_and(|f| f.is_submitting_for(target)) {
                if applied {
                    *feedback = None;
                } else if let Some(form) = feedback.as_mut() {
                    form.set_submitting(false);
                }
            }

            match result {
                Ok(answer) if applied => answer,
                Ok(_) => return Err(ChatError::MessagePending(target)),
                Err(e) => {
                    tracing::warn!("Feedback for message {} failed: {}", target, e);
                    return Err(e.into());
                }
            }
        };
        tracing::debug!("Feedback applied to message {}", target);
        self.emit(ChatEvent::FeedbackApplied {
            timestamp: Utc::now(),
            message_id: target,
            re_evaluate: request.re_evaluate,
            clarifications: request.clarification.len(),
        })
        .await;

        Ok(FeedbackReceipt::Revised {
            message: target,
            content: answer,
        })
    }

    /// Edit the armed form in place
    pub fn with_feedback_form<R>(
        &self,
        edit: impl FnOnce(&mut FeedbackForm) -> Result<R, ChatError>,
    ) -> Result<R, ChatError> {
        let mut state = self.lock();
        let form = state.feedback.as_mut().ok_or(ChatError::NotArmed)?;
        edit(form)
    }

    pub fn armed_feedback(&self) -> Option<FeedbackForm> {
        self.lock().feedback.clone()
    }

    /// Close the form; returns whether one was open
    pub fn dismiss_feedback(&self) -> bool {
        self.lock().feedback.take().is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Attachments
    // ─────────────────────────────────────────────────────────────────────────

    /// Upload and register a file.
    ///
    /// Failures are logged and yield `None`; the uploading indicator is
    /// cleared either way.
    pub async fn upload_file(&self, upload: FileUpload) -> Option<UploadedFile> {
        let ticket = self.lock().attachments.begin_upload(upload.name.clone());

        let result = async {
            let session = self.ensure_session(&upload.name).await?;
            let stored = self.backend.upload_file(&session, &upload).await?;
            let storage_id = self
                .backend
                .register_file(&session, &stored, &upload.name)
                .await?;
            Ok::<_, ChatError>(UploadedFile {
                display_name: stored.filename,
                original_name: Some(upload.name.clone()),
                storage_id,
            })
        }
        .await;

        match result {
            Ok(file) => {
                self.lock()
                    .attachments
                    .finish_upload(ticket, Some(file.clone()));
                tracing::info!("Uploaded {} as {}", upload.name, file.display_name);
                self.emit(ChatEvent::FileUploaded {
                    timestamp: Utc::now(),
                    name: file.display_name.clone(),
                    storage_id: file.storage_id.clone(),
                })
                .await;
                Some(file)
            }
            Err(e) => {
                self.lock().attachments.finish_upload(ticket, None);
                tracing::warn!("Upload of {} failed: {}", upload.name, e);
                self.emit(ChatEvent::Error {
                    timestamp: Utc::now(),
                    message: e.to_string(),
                    context: Some(format!("upload {}", upload.name)),
                })
                .await;
                None
            }
        }
    }

    /// Upload several files concurrently; the list ends in completion order
    pub async fn upload_files(&self, uploads: Vec<FileUpload>) -> Vec<UploadedFile> {
        futures::future::join_all(uploads.into_iter().map(|u| self.upload_file(u)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    /// Delete the attachment at `index`.
    ///
    /// Returns `Ok(false)` without a call when the entry has no storage id.
    /// On failure the list is left as it was.
    pub async fn remove_file(&self, index: usize) -> Result<bool, ChatError> {
        let Some(storage_id) = self
            .lock()
            .attachments
            .storage_id(index)
            .map(str::to_string)
        else {
            tracing::debug!("No storage id for attachment {}, nothing to remove", index);
            return Ok(false);
        };

        let session = self.session_id().ok_or(ChatError::NoSession)?;
        self.backend.delete_file(&session, &storage_id).await?;

        let removed = self.lock().attachments.remove_confirmed(&storage_id);
        if let Some(file) = &removed {
            self.emit(ChatEvent::FileRemoved {
                timestamp: Utc::now(),
                name: file.display_name.clone(),
            })
            .await;
        }
        Ok(removed.is_some())
    }

    pub fn attachments(&self) -> Vec<UploadedFile> {
        self.lock().attachments.files().to_vec()
    }

    pub fn uploading(&self) -> Vec<InFlightUpload> {
        self.lock().attachments.uploading().to_vec()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────────

    /// Live messages, newest first
    pub fn messages(&self) -> Vec<Message> {
        self.lock().timeline.messages().to_vec()
    }

    /// Live messages followed by read-only history
    pub fn transcript(&self) -> Vec<DisplayEntry> {
        let state = self.lock();
        session::transcript(state.timeline.messages(), state.history.pairs())
    }
}

/// Arm the sub-controller an outcome asks for
fn apply_outcome(state: &mut ControllerState, slot: MessageId, query: &str, outcome: &Outcome) {
    match outcome {
        Outcome::Direct { .. } => {}
        Outcome::CapabilityGap { .. } | Outcome::CapabilityGapWithReview { .. } => {
            state.reflexion = ReflexionState::awaiting(query, slot);
        }
        Outcome::NeedsReview { jargon, .. } => {
            state.feedback = Some(FeedbackForm::for_review(slot, jargon));
        }
    }
}
