//! KYC document storage
//!
//! Uploads arrive base64-encoded in the JSON request body. Each document is written as
//! `kyc_docs/<uuid>.<ext>` under the root folder and the relative path is what the
//! request stores, so the root folder can move without rewriting rows.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, WorkflowError};

/// Folder name under the root folder
pub const DOCUMENTS_DIR: &str = "kyc_docs";

/// Default upload limit when the setting is absent (10 MiB)
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Document upload as carried in a create-request body
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    /// Original file name; only its extension is kept
    pub filename: String,
    /// File content, standard base64
    pub content_base64: String,
}

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root_folder: PathBuf,
    max_bytes: usize,
}

impl DocumentStore {
    pub fn new(root_folder: PathBuf, max_bytes: usize) -> Self {
        Self {
            root_folder,
            max_bytes,
        }
    }

    /// Absolute path for a stored reference
    pub fn resolve(&self, reference: &str) -> PathBuf {
        self.root_folder.join(reference)
    }

    /// Decode, size-check and write an upload; returns the stored reference
    pub async fn store(&self, upload: &DocumentUpload) -> Result<String> {
        let bytes = STANDARD
            .decode(upload.content_base64.trim())
            .map_err(|e| WorkflowError::Validation(format!("KYC document is not valid base64: {}", e)))?;

        if bytes.is_empty() {
            return Err(WorkflowError::Validation("KYC document is empty".to_string()));
        }
        if bytes.len() > self.max_bytes {
            return Err(WorkflowError::Validation(format!(
                "KYC document is {} bytes; the limit is {} bytes",
                bytes.len(),
                self.max_bytes
            )));
        }

        let file_name = match extension_of(&upload.filename) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let reference = format!("{}/{}", DOCUMENTS_DIR, file_name);

        let dir = self.root_folder.join(DOCUMENTS_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(stagepass_common::Error::from)?;
        tokio::fs::write(dir.join(&file_name), &bytes)
            .await
            .map_err(stagepass_common::Error::from)?;

        info!(reference = %reference, size = bytes.len(), "Stored KYC document");
        Ok(reference)
    }

    /// Delete a stored document whose request was never persisted
    pub async fn discard(&self, reference: &str) {
        let path = self.resolve(reference);
        if let Err(e) = tokio::fs::remove_file(&path).await {
            warn!("Failed to remove orphaned KYC document {}: {}", path.display(), e);
        }
    }
}

/// Lowercase alphanumeric extension of at most 8 characters
fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn upload(filename: &str, content: &[u8]) -> DocumentUpload {
        DocumentUpload {
            filename: filename.to_string(),
            content_base64: STANDARD.encode(content),
        }
    }

    #[tokio::test]
    async fn test_store_writes_under_documents_dir() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path().to_path_buf(), 1024);

        let reference = store.store(&upload("Passport.JPG", b"image-bytes")).await.unwrap();
        assert!(reference.starts_with("kyc_docs/"));
        assert!(reference.ends_with(".jpg"));

        let written = std::fs::read(store.resolve(&reference)).unwrap();
        assert_eq!(written, b"image-bytes");
    }

    #[tokio::test]
    async fn test_rejects_oversized_and_malformed_uploads() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path().to_path_buf(), 4);

        let err = store.store(&upload("id.png", b"too large")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Validation(_)));

        let bad = DocumentUpload {
            filename: "id.png".into(),
            content_base64: "***".into(),
        };
        assert!(matches!(
            store.store(&bad).await.unwrap_err(),
            WorkflowError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_discard_removes_file() {
        let temp = TempDir::new().unwrap();
        let store = DocumentStore::new(temp.path().to_path_buf(), 1024);
        let reference = store.store(&upload("id.pdf", b"pdf")).await.unwrap();

        store.discard(&reference).await;
        assert!(!store.resolve(&reference).exists());
    }

    #[test]
    fn test_extension_sanitizing() {
        assert_eq!(extension_of("scan.PDF"), Some("pdf".to_string()));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("evil.p/h"), None);
        assert_eq!(extension_of("weird.ex$"), None);
        assert_eq!(extension_of("long.abcdefghij"), None);
    }
}
