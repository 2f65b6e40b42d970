//! File-backed `HostDocument`.
//!
//! Stands in for Word when the task pane logic runs outside the host: the
//! document is a `.docx` on disk and the "selection" is an in-memory buffer.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lateral_addin_core::{AddinError, DocumentFile, HostDocument, Slice, UploadState};
use tracing::{debug, instrument};

/// A document on the local filesystem.
#[derive(Debug)]
pub struct LocalDocument {
    path: PathBuf,
    selection: Mutex<String>,
}

impl LocalDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            selection: Mutex::new(String::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Text inserted at the selection so far.
    pub fn selection_text(&self) -> String {
        self.selection
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HostDocument for LocalDocument {
    #[instrument(skip(self), level = "debug", fields(path = %self.path.display()))]
    async fn get_file(&self, slice_size: usize) -> Result<Box<dyn DocumentFile>, AddinError> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| AddinError::Host(format!("failed: {}", e)))?;
        debug!("Opened {} bytes", data.len());
        Ok(Box::new(LocalFile::new(data, slice_size)))
    }

    async fn insert_text_at_selection_end(&self, text: &str) -> Result<(), AddinError> {
        let mut selection = self
            .selection
            .lock()
            .map_err(|_| AddinError::Host("selection lock poisoned".to_string()))?;
        selection.push_str(text);
        Ok(())
    }

    #[instrument(skip(self, base64_document), level = "debug", fields(path = %self.path.display()))]
    async fn replace_body_from_base64(&self, base64_document: &str) -> Result<(), AddinError> {
        let bytes = STANDARD
            .decode(base64_document.trim())
            .map_err(|e| AddinError::Host(format!("invalid base64 document: {}", e)))?;
        tokio::fs::write(&self.path, &bytes)
            .await
            .map_err(|e| AddinError::Host(format!("failed: {}", e)))?;
        debug!("Replaced document body ({} bytes)", bytes.len());
        Ok(())
    }
}

/// Open handle on a document read into memory.
#[derive(Debug)]
pub struct LocalFile {
    data: Vec<u8>,
    slice_size: usize,
}

impl LocalFile {
    pub fn new(data: Vec<u8>, slice_size: usize) -> Self {
        Self {
            data,
            slice_size: slice_size.max(1),
        }
    }
}

#[async_trait]
impl DocumentFile for LocalFile {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn slice_count(&self) -> u32 {
        UploadState::slice_count_for(self.size(), self.slice_size)
    }

    async fn get_slice(&mut self, index: u32) -> Result<Slice, AddinError> {
        if index >= self.slice_count() {
            return Err(AddinError::Host(format!(
                "failed: slice {} out of range ({} slices)",
                index,
                self.slice_count()
            )));
        }
        let start = index as usize * self.slice_size;
        let end = (start + self.slice_size).min(self.data.len());
        Ok(Slice {
            index,
            data: self.data[start..end].to_vec(),
        })
    }

    async fn close(self: Box<Self>) -> Result<(), AddinError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_slices_divisible_size() {
        let mut file = LocalFile::new(vec![7u8; 12], 4);
        assert_eq!(file.slice_count(), 3);
        for i in 0..3 {
            assert_eq!(file.get_slice(i).await.unwrap().size(), 4);
        }
        assert!(file.get_slice(3).await.is_err());
    }

    #[tokio::test]
    async fn test_last_slice_is_smaller() {
        let mut file = LocalFile::new((0u8..10).collect(), 4);
        assert_eq!(file.slice_count(), 3);
        let last = file.get_slice(2).await.unwrap();
        assert_eq!(last.data, vec![8, 9]);
    }

    #[tokio::test]
    async fn test_get_file_and_replace_body() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("letter.docx");
        tokio::fs::write(&path, b"PK\x03\x04old").await.unwrap();

        let document = LocalDocument::new(&path);
        let file = document.get_file(4).await.unwrap();
        assert_eq!(file.size(), 7);
        assert_eq!(file.slice_count(), 2);
        file.close().await.unwrap();

        // "UEsDBG5ldw==" is base64 for "PK\x03\x04new"
        document.replace_body_from_base64("UEsDBG5ldw==").await.unwrap();
        let content = tokio::fs::read(&path).await.unwrap();
        assert_eq!(content, b"PK\x03\x04new");
    }

    #[tokio::test]
    async fn test_missing_document() {
        let temp_dir = TempDir::new().unwrap();
        let document = LocalDocument::new(temp_dir.path().join("missing.docx"));
        let err = document.get_file(4).await.err().unwrap();
        assert!(matches!(err, AddinError::Host(_)));
    }

    #[tokio::test]
    async fn test_insert_appends_to_selection() {
        let document = LocalDocument::new("unused.docx");
        document.insert_text_at_selection_end("Dear ").await.unwrap();
        document
            .insert_text_at_selection_end("{CaseNumber}")
            .await
            .unwrap();
        assert_eq!(document.selection_text(), "Dear {CaseNumber}");
    }
}
