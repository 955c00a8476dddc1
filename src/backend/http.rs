//! REST implementation of [`ChatBackend`]
//!
//! Works against the chat service's `/chats` routes. Every non-2xx status is
//! reported as [`BackendError::Status`] with the response body as message.

use async_trait::async_trait;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;

use super::types::{
    answer_text, ConversationPair, ConversationsEnvelope, CustomTool, FeedbackEnvelope,
    FeedbackRequest, FileRecord, FileUpload, QueryEnvelope, QueryPayload, RegisteredFile,
    ResponseEnvelope, SessionId, SessionSnapshot, SessionSummary, StoredFile, ToolVerdict,
};
use super::{BackendError, ChatBackend};
use crate::chat::{Role, ToolDraft};

/// HTTP client for the chat service
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client for `base_url` (e.g. `http://localhost:8000`).
    ///
    /// `timeout` of `None` means requests may wait indefinitely.
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, BackendError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            BackendError::Network(format!("Failed to create HTTP client: {}", e))
        })?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::debug!("Initialized HTTP backend: {}", base_url);

        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn chat_url(&self, session: &SessionId, rest: &str) -> String {
        self.url(&format!("/chats/{}{}", session, rest))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|e| BackendError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        self.send(request)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn create_session(&self, title: &str) -> Result<SessionSummary, BackendError> {
        let request = self.client.post(self.url("/chats")).json(&json!({ "title": title }));
        self.send_json(request).await
    }

    async fn list_sessions(&self) -> Result<Vec<SessionSummary>, BackendError> {
        self.send_json(self.client.get(self.url("/chats"))).await
    }

    async fn fetch_session(&self, session: &SessionId) -> Result<SessionSnapshot, BackendError> {
        self.send_json(self.client.get(self.chat_url(session, ""))).await
    }

    async fn post_message(
        &self,
        session: &SessionId,
        role: Role,
        content: &str,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.chat_url(session, "/messages"))
            .json(&json!({ "role": role.as_str(), "content": content }));
        self.send(request).await.map(|_| ())
    }

    async fn post_query(
        &self,
        session: &SessionId,
        text: &str,
    ) -> Result<QueryPayload, BackendError> {
        let request = self
            .client
            .post(self.chat_url(session, "/query"))
            .json(&json!({ "text": text }));
        let envelope: QueryEnvelope = self.send_json(request).await?;
        Ok(envelope.response)
    }

    async fn request_tool_creation(
        &self,
        session: &SessionId,
        query: &str,
    ) -> Result<ToolVerdict, BackendError> {
        let request = self
            .client
            .post(self.chat_url(session, "/add_tools"))
            .json(&json!({ "text": query }));
        let envelope: ResponseEnvelope = self.send_json(request).await?;
        Ok(ToolVerdict::from_response(envelope.response))
    }

    async fn create_tool(
        &self,
        session: &SessionId,
        draft: &ToolDraft,
    ) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.chat_url(session, "/tools"))
            .json(&json!({
                "name": draft.name.trim(),
                "description": draft.description(),
                "python_code": draft.code(),
            }));
        self.send(request).await.map(|_| ())
    }

    async fn list_tools(&self, session: &SessionId) -> Result<Vec<CustomTool>, BackendError> {
        self.send_json(self.client.get(self.chat_url(session, "/tools")))
            .await
    }

    async fn delete_tool(&self, session: &SessionId, tool_id: &str) -> Result<(), BackendError> {
        let url = self.chat_url(session, &format!("/tools/{}", tool_id));
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    async fn upload_file(
        &self,
        session: &SessionId,
        file: &FileUpload,
    ) -> Result<StoredFile, BackendError> {
        let part = multipart::Part::bytes(file.bytes.to_vec()).file_name(file.name.clone());
        let form = multipart::Form::new().part("file", part);
        let request = self
            .client
            .post(self.chat_url(session, "/upload"))
            .multipart(form);
        self.send_json(request).await
    }

    async fn register_file(
        &self,
        session: &SessionId,
        stored: &StoredFile,
        original_name: &str,
    ) -> Result<Option<String>, BackendError> {
        let request = self
            .client
            .post(self.chat_url(session, "/files"))
            .json(&json!({
                "filename": stored.filename,
                "original_filename": original_name,
                "file_url": stored.file_url,
            }));
        let registered: RegisteredFile = self.send_json(request).await?;
        Ok(registered.file_id)
    }

    async fn delete_file(&self, session: &SessionId, file_id: &str) -> Result<(), BackendError> {
        let url = self.chat_url(session, &format!("/files/{}", file_id));
        self.send(self.client.delete(url)).await.map(|_| ())
    }

    async fn list_files(&self, session: &SessionId) -> Result<Vec<FileRecord>, BackendError> {
        self.send_json(self.client.get(self.chat_url(session, "/files")))
            .await
    }

    async fn fetch_conversations(
        &self,
        session: &SessionId,
    ) -> Result<Vec<ConversationPair>, BackendError> {
        let envelope: ConversationsEnvelope = self
            .send_json(self.client.get(self.chat_url(session, "/get_conversations")))
            .await?;
        Ok(envelope.conversations)
    }

    async fn post_feedback(
        &self,
        session: &SessionId,
        request: &FeedbackRequest,
    ) -> Result<String, BackendError> {
        let builder = self
            .client
            .post(self.chat_url(session, "/feedback"))
            .json(request);
        let envelope: FeedbackEnvelope = self.send_json(builder).await?;
        Ok(answer_text(&envelope.response.final_answer))
    }
}
