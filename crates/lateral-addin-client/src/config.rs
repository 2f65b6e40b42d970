use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use lateral_addin_core::{AddinError, SessionStore, DEFAULT_SLICE_SIZE};

use crate::discovery::DEFAULT_DISCOVERY_URL;
use crate::store::{DocumentSettingsStore, LocalStorageStore};

/// Configuration for the lateral-addin command line client.
#[derive(Parser, Debug, Clone)]
#[command(name = "lateral-addin")]
#[command(about = "Lateral Word add-in task pane, driven from the command line")]
pub struct Config {
    /// Server discovery endpoint
    #[arg(long, global = true, default_value = DEFAULT_DISCOVERY_URL, env = "LATERAL_DISCOVERY_URL")]
    pub discovery_url: String,

    /// Upload slice size in bytes
    #[arg(long, global = true, default_value_t = DEFAULT_SLICE_SIZE, env = "LATERAL_SLICE_SIZE")]
    pub slice_size: usize,

    /// Where the session is persisted
    #[arg(long, global = true, value_enum, default_value = "local", env = "LATERAL_SESSION_STORE")]
    pub session_store: SessionStoreKind,

    /// Directory for the local session store (default: platform config dir)
    #[arg(long, global = true, env = "LATERAL_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Active document
    #[arg(long, global = true, default_value = "document.docx", env = "LATERAL_DOCUMENT")]
    pub document: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    /// Per-user settings file
    Local,
    /// Settings file next to the document
    Document,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the backend servers configured for a sub-domain
    Discover {
        sub_domain: String,
    },

    /// Log in and persist the session
    Login {
        /// Backend base URL, e.g. https://acme.lateral1.com/
        #[arg(long, conflicts_with = "sub_domain")]
        server: Option<String>,

        /// Resolve the server through discovery instead
        #[arg(long, required_unless_present = "server")]
        sub_domain: Option<String>,

        /// Use the production server from discovery (default: staging)
        #[arg(long, requires = "sub_domain")]
        production: bool,

        #[arg(long)]
        username: String,

        #[arg(long, env = "LATERAL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Clear the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// List templates
    Templates,

    /// List letters
    Letters,

    /// List variables
    Variables,

    /// Upload the document as a template
    UploadTemplate {
        /// Create a new template with this name
        #[arg(long, required_unless_present = "template_id", conflicts_with = "template_id")]
        name: Option<String>,

        /// Overwrite an existing template
        #[arg(long)]
        template_id: Option<String>,
    },

    /// Upload the document as a letter for a case
    UploadLetter {
        #[arg(long)]
        letter_id: String,

        #[arg(long)]
        case_id: String,
    },

    /// Replace the document with a template
    LoadTemplate {
        #[arg(long)]
        template_id: String,
    },

    /// Replace the document with a letter generated for a case
    LoadLetter {
        #[arg(long)]
        letter_id: String,

        #[arg(long)]
        case_id: String,
    },

    /// Print the placeholder for a variable
    InsertVariable {
        variable_id: String,
    },
}

impl Config {
    pub fn open_session_store(&self) -> Result<Arc<dyn SessionStore>, AddinError> {
        Ok(match self.session_store {
            SessionStoreKind::Local => match &self.config_dir {
                Some(dir) => Arc::new(LocalStorageStore::new(dir)),
                None => Arc::new(LocalStorageStore::default_location()?),
            },
            SessionStoreKind::Document => {
                Arc::new(DocumentSettingsStore::for_document(&self.document))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::try_parse_from(["lateral-addin", "whoami"]).unwrap();
        assert_eq!(config.slice_size, 4_000_000);
        assert_eq!(config.session_store, SessionStoreKind::Local);
        assert_eq!(config.document, PathBuf::from("document.docx"));
        assert_eq!(config.command, Command::Whoami);
    }

    #[test]
    fn test_login_requires_server_or_sub_domain() {
        let err = Config::try_parse_from([
            "lateral-addin",
            "login",
            "--username",
            "jo",
            "--password",
            "pw",
        ]);
        assert!(err.is_err());

        let config = Config::try_parse_from([
            "lateral-addin",
            "login",
            "--sub-domain",
            "acme",
            "--production",
            "--username",
            "jo",
            "--password",
            "pw",
        ])
        .unwrap();
        match config.command {
            Command::Login {
                sub_domain,
                production,
                ..
            } => {
                assert_eq!(sub_domain.as_deref(), Some("acme"));
                assert!(production);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_upload_template_destination() {
        assert!(Config::try_parse_from(["lateral-addin", "upload-template"]).is_err());
        assert!(Config::try_parse_from([
            "lateral-addin",
            "upload-template",
            "--name",
            "A",
            "--template-id",
            "1"
        ])
        .is_err());

        let config = Config::try_parse_from([
            "lateral-addin",
            "--slice-size",
            "1024",
            "upload-template",
            "--template-id",
            "7",
        ])
        .unwrap();
        assert_eq!(config.slice_size, 1024);
        assert_eq!(
            config.command,
            Command::UploadTemplate {
                name: None,
                template_id: Some("7".to_string())
            }
        );
    }

    #[test]
    fn test_document_session_store() {
        let config = Config::try_parse_from([
            "lateral-addin",
            "letters",
            "--session-store",
            "document",
            "--document",
            "/tmp/letter.docx",
        ])
        .unwrap();
        assert_eq!(config.session_store, SessionStoreKind::Document);
        assert!(config.open_session_store().is_ok());
    }
}
