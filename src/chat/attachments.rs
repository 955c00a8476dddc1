//! Attachment list with per-upload progress
//!
//! Uploads are tracked by ticket so two files with the same name can be in
//! flight at once. Entries are appended in completion order and removed only
//! after the backend confirms the deletion.

use serde::Serialize;

use crate::backend::FileRecord;

/// A file the backend has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// Name shown to the user (storage filename, as the backend lists it)
    pub display_name: String,
    /// Local name the file was uploaded from
    pub original_name: Option<String>,
    /// Metadata id needed for deletion
    pub storage_id: Option<String>,
}

impl From<FileRecord> for UploadedFile {
    fn from(record: FileRecord) -> Self {
        Self {
            display_name: record.filename,
            original_name: record.original_filename,
            storage_id: Some(record.id),
        }
    }
}

/// Handle for an in-flight upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UploadTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InFlightUpload {
    pub ticket: UploadTicket,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct AttachmentManager {
    files: Vec<UploadedFile>,
    uploading: Vec<InFlightUpload>,
    next_ticket: u64,
}

impl AttachmentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list with what the backend reports for a session
    pub fn seed(&mut self, records: Vec<FileRecord>) {
        self.files = records.into_iter().map(UploadedFile::from).collect();
    }

    pub fn files(&self) -> &[UploadedFile] {
        &self.files
    }

    pub fn uploading(&self) -> &[InFlightUpload] {
        &self.uploading
    }

    pub fn begin_upload(&mut self, name: impl Into<String>) -> UploadTicket {
        self.next_ticket += 1;
        let ticket = UploadTicket(self.next_ticket);
        self.uploading.push(InFlightUpload {
            ticket,
            name: name.into(),
        });
        ticket
    }

    /// Clear the indicator and, on success, append the file
    pub fn finish_upload(&mut self, ticket: UploadTicket, file: Option<UploadedFile>) {
        self.uploading.retain(|u| u.ticket != ticket);
        if let Some(file) = file {
            self.files.push(file);
        }
    }

    /// Storage id for the entry at `index`, if the entry exists and has one
    pub fn storage_id(&self, index: usize) -> Option<&str> {
        self.files.get(index)?.storage_id.as_deref()
    }

    /// Remove the entry carrying `storage_id` (its index may have moved)
    pub fn remove_confirmed(&mut self, storage_id: &str) -> Option<UploadedFile> {
        let index = self
            .files
            .iter()
            .position(|f| f.storage_id.as_deref() == Some(storage_id))?;
        Some(self.files.remove(index))
    }
}
