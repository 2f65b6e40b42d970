use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AddinError;

/// An authenticated backend session.
///
/// Field names on the wire match the keys the task pane has always stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Value sent in the `authorisation` header
    pub token: String,
    /// User display name
    pub name: String,
    /// Selected base server URL, ending with `/`
    #[serde(rename = "serverSettings")]
    pub server: String,
}

impl Session {
    /// Build an endpoint URL under the session's server.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }
}

/// Persistence for the session.
///
/// Two variants exist: one keyed to the user profile (like browser local
/// storage) and one bound to the active document's settings.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Read the stored session, if any.
    async fn load(&self) -> Result<Option<Session>, AddinError>;

    /// Store `session`, replacing any previous one.
    async fn save(&self, session: &Session) -> Result<(), AddinError>;

    /// Remove the stored session.
    async fn clear(&self) -> Result<(), AddinError>;
}
