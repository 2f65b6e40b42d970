use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slice size requested from the host when reading the document.
pub const DEFAULT_SLICE_SIZE: usize = 4_000_000;

/// Kind of backend record an upload creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadTarget {
    Template,
    Letter,
}

impl UploadTarget {
    /// Path segment of the create endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadTarget::Template => "template",
            UploadTarget::Letter => "letter",
        }
    }
}

impl fmt::Display for UploadTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the uploaded document lands on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UploadDestination {
    /// A brand new template with the given name.
    NewTemplate { name: String },
    /// A new version of an existing template.
    ExistingTemplate { template_id: String },
    /// A letter generated for a case.
    Letter { letter_id: String, case_id: String },
}

impl UploadDestination {
    pub fn target(&self) -> UploadTarget {
        match self {
            UploadDestination::NewTemplate { .. } | UploadDestination::ExistingTemplate { .. } => {
                UploadTarget::Template
            }
            UploadDestination::Letter { .. } => UploadTarget::Letter,
        }
    }

    /// Destination metadata fields sent with every slice.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            UploadDestination::NewTemplate { name } => vec![("letter_name", name.clone())],
            UploadDestination::ExistingTemplate { template_id } => {
                vec![("letter_id", template_id.clone())]
            }
            UploadDestination::Letter { letter_id, case_id } => vec![
                ("letter_id", letter_id.clone()),
                ("case_id", case_id.clone()),
            ],
        }
    }
}

/// Progress of one sliced upload.
///
/// `counter` counts slices the backend has accepted. The file handle may only
/// be closed once it equals `slice_count`.
#[derive(Debug, Clone)]
pub struct UploadState {
    pub destination: UploadDestination,
    pub counter: u32,
    pub slice_count: u32,
    /// Server-assigned file name, known after the first accepted slice
    pub filename: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl UploadState {
    pub fn new(destination: UploadDestination, slice_count: u32) -> Self {
        Self {
            destination,
            counter: 0,
            slice_count,
            filename: None,
            started_at: Utc::now(),
        }
    }

    pub fn target(&self) -> UploadTarget {
        self.destination.target()
    }

    /// One-based number of the slice currently being sent.
    pub fn slice_no(&self) -> u32 {
        self.counter + 1
    }

    /// Record an accepted slice.
    pub fn advance(&mut self) {
        self.counter += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.counter >= self.slice_count
    }

    /// Number of slices a document of `size` bytes is divided into.
    pub fn slice_count_for(size: u64, slice_size: usize) -> u32 {
        let slice_size = slice_size.max(1) as u64;
        size.div_ceil(slice_size) as u32
    }
}
