//! Lateral add-in client.
//!
//! Talks to the Lateral backend on behalf of the Word task pane and drives
//! the pane's form through [`TaskPane`]. Outside Word, [`LocalDocument`]
//! stands in for the active document.

pub mod backend;
pub mod config;
pub mod discovery;
pub mod local_document;
pub mod store;
pub mod taskpane;
pub mod upload;

#[cfg(test)]
mod testing;

pub use backend::{ApiResponse, BackendClient, SliceReceipt};
pub use discovery::{ServerDiscovery, ServerSettings};
pub use local_document::LocalDocument;
pub use store::{DocumentSettingsStore, LocalStorageStore, MemorySessionStore};
pub use taskpane::TaskPane;
pub use upload::{SliceUploader, StatusSink, UploadReport};
