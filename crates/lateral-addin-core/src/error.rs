/// Errors raised by the add-in client.
///
/// Every variant renders to the single line shown in the task pane's status
/// banner, so `Rejected` and `Host` carry the text verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AddinError {
    #[error("HTTP error: {0}")]
    Http(String),

    /// The backend answered with `result: false`; carries its `message`.
    #[error("{0}")]
    Rejected(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A host document operation failed; carries the host status string.
    #[error("{0}")]
    Host(String),

    #[error("Not logged in")]
    NotAuthenticated,

    #[error("Session storage error: {0}")]
    Storage(String),

    #[error("Upload cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for AddinError {
    fn from(e: serde_json::Error) -> Self {
        AddinError::InvalidResponse(e.to_string())
    }
}
