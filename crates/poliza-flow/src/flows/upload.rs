use std::path::Path;

use mime::Mime;

use super::{FlowError, FlowKind};

/// A file picked for upload, held in memory until the back office accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content_type: Mime,
    pub bytes: Vec<u8>,
}

impl DocumentUpload {
    pub fn new(file_name: impl Into<String>, content_type: Mime, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }

    /// Read a file from disk, guessing its type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let content_type = mime_guess::from_path(path).first_or_octet_stream();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "documento".to_string());
        Ok(Self::new(file_name, content_type, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Reject files the flow cannot take before anything is sent.
    pub fn validate(&self, kind: FlowKind, max_bytes: u64) -> Result<(), FlowError> {
        if self.bytes.is_empty() {
            return Err(FlowError::EmptyFile);
        }
        if self.size() > max_bytes {
            return Err(FlowError::FileTooLarge {
                size: self.size(),
                limit: max_bytes,
            });
        }
        let essence = self.content_type.essence_str();
        let accepted = kind
            .accepted_types()
            .iter()
            .any(|allowed| allowed.essence_str() == essence);
        if !accepted {
            return Err(FlowError::UnsupportedFileType(essence.to_string()));
        }
        Ok(())
    }
}
