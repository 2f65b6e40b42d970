//! In-memory host document for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lateral_addin_core::{AddinError, DocumentFile, HostDocument, Slice};

use crate::local_document::LocalFile;

/// Host whose document is a byte buffer; records closes, inserts and loads.
#[derive(Debug, Default)]
pub struct RecordingHost {
    data: Vec<u8>,
    fail_close: bool,
    closed: Arc<AtomicBool>,
    inserted: Mutex<String>,
    replaced: Mutex<Option<String>>,
}

impl RecordingHost {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            ..Default::default()
        }
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn inserted(&self) -> String {
        self.inserted.lock().unwrap().clone()
    }

    pub fn replaced(&self) -> Option<String> {
        self.replaced.lock().unwrap().clone()
    }
}

struct RecordingFile {
    inner: LocalFile,
    fail_close: bool,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl DocumentFile for RecordingFile {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn slice_count(&self) -> u32 {
        self.inner.slice_count()
    }

    async fn get_slice(&mut self, index: u32) -> Result<Slice, AddinError> {
        self.inner.get_slice(index).await
    }

    async fn close(self: Box<Self>) -> Result<(), AddinError> {
        if self.fail_close {
            return Err(AddinError::Host("failed".to_string()));
        }
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl HostDocument for RecordingHost {
    async fn get_file(&self, slice_size: usize) -> Result<Box<dyn DocumentFile>, AddinError> {
        Ok(Box::new(RecordingFile {
            inner: LocalFile::new(self.data.clone(), slice_size),
            fail_close: self.fail_close,
            closed: Arc::clone(&self.closed),
        }))
    }

    async fn insert_text_at_selection_end(&self, text: &str) -> Result<(), AddinError> {
        self.inserted.lock().unwrap().push_str(text);
        Ok(())
    }

    async fn replace_body_from_base64(&self, base64_document: &str) -> Result<(), AddinError> {
        *self.replaced.lock().unwrap() = Some(base64_document.to_string());
        Ok(())
    }
}
