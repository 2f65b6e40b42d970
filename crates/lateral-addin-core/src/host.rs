use async_trait::async_trait;

use crate::error::AddinError;

/// One fixed-size chunk of the compressed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slice {
    /// Zero-based slice index
    pub index: u32,
    /// Slice bytes
    pub data: Vec<u8>,
}

impl Slice {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// An open handle on the compressed document, read slice by slice.
///
/// The handle stays open until `close` is called. Dropping it without
/// closing is how an abandoned upload looks to the host.
#[async_trait]
pub trait DocumentFile: Send {
    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Number of slices the file was divided into.
    fn slice_count(&self) -> u32;

    /// Read slice `index` (zero-based).
    async fn get_slice(&mut self, index: u32) -> Result<Slice, AddinError>;

    /// Release the handle.
    async fn close(self: Box<Self>) -> Result<(), AddinError>;
}

/// The host application's active document.
#[async_trait]
pub trait HostDocument: Send + Sync {
    /// Open the compressed document divided into `slice_size`-byte slices.
    async fn get_file(&self, slice_size: usize) -> Result<Box<dyn DocumentFile>, AddinError>;

    /// Insert `text` at the end of the current selection.
    async fn insert_text_at_selection_end(&self, text: &str) -> Result<(), AddinError>;

    /// Replace the whole document body with a base64-encoded document.
    async fn replace_body_from_base64(&self, base64_document: &str) -> Result<(), AddinError>;
}
