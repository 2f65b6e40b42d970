//! Core traits and types for the Lateral Word add-in client.
//!
//! This crate defines the abstractions shared between the backend client and
//! whatever hosts the task pane:
//! - `HostDocument` / `DocumentFile`: the host application's document and file-slice API
//! - `SessionStore`: where the authenticated session is persisted
//! - `UploadState`: progress of one sliced document upload
//! - `ui`: the task pane's form state and pure render functions

mod document;
mod error;
mod host;
mod session;
mod upload;
pub mod ui;

pub use document::{listing_entries, ordered_entries, DocumentRef, Variable};
pub use error::AddinError;
pub use host::{DocumentFile, HostDocument, Slice};
pub use session::{Session, SessionStore};
pub use upload::{UploadDestination, UploadState, UploadTarget, DEFAULT_SLICE_SIZE};
