//! Task pane orchestration.
//!
//! Each public operation corresponds to one control on the pane. Operations
//! update `UiState` (busy flags, dropdowns, status banner) as they go and
//! also return the outcome so callers without a UI can act on it.

use std::sync::Arc;
use std::time::Duration;

use lateral_addin_core::ui::{render, Status, UiEvent, UiState, View};
use lateral_addin_core::{
    AddinError, DocumentRef, HostDocument, Session, SessionStore, UploadDestination,
    UploadTarget, Variable, DEFAULT_SLICE_SIZE,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::BackendClient;
use crate::discovery::ServerDiscovery;
use crate::upload::{SliceUploader, UploadReport, CLOSE_FAILED_MESSAGE};

/// Delay between an expired-token listing and the forced logout.
pub const LOGOUT_DELAY: Duration = Duration::from_millis(1000);

pub const TOKEN_EXPIRED_MESSAGE: &str = "Authentication token expired. Please login again.";
pub const LOGIN_SUCCESS_MESSAGE: &str = "Login successful";
pub const SETTINGS_SAVED_MESSAGE: &str = "Settings saved.";
pub const LOGOUT_SUCCESS_MESSAGE: &str = "Logout successful.";
pub const UPLOAD_SUCCESS_MESSAGE: &str = "File saved to the server successfully.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Listing {
    Templates,
    Letters,
    Variables,
}

pub struct TaskPane {
    ui: UiState,
    session: Option<Session>,
    backend: BackendClient,
    discovery: ServerDiscovery,
    host: Arc<dyn HostDocument>,
    store: Arc<dyn SessionStore>,
    slice_size: usize,
    logout_delay: Duration,
}

impl TaskPane {
    pub fn new(
        backend: BackendClient,
        discovery: ServerDiscovery,
        host: Arc<dyn HostDocument>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            ui: UiState::default(),
            session: None,
            backend,
            discovery,
            host,
            store,
            slice_size: DEFAULT_SLICE_SIZE,
            logout_delay: LOGOUT_DELAY,
        }
    }

    pub fn with_slice_size(mut self, slice_size: usize) -> Self {
        self.slice_size = slice_size;
        self
    }

    pub fn with_logout_delay(mut self, delay: Duration) -> Self {
        self.logout_delay = delay;
        self
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    /// Banners shown since the last call, oldest first.
    pub fn drain_status_log(&mut self) -> Vec<Status> {
        self.ui.drain_status_log()
    }

    pub fn view(&self) -> View {
        render(&self.ui)
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn handle(&mut self, event: UiEvent) {
        debug!("UI event: {:?}", event);
        self.ui.apply(event);
    }

    fn status(&mut self, status: Status) {
        match status.kind {
            lateral_addin_core::ui::StatusKind::Success => info!("{}", status.message),
            lateral_addin_core::ui::StatusKind::Danger => warn!("{}", status.message),
        }
        self.ui.set_status(status);
    }

    fn require_session(&self) -> Result<Session, AddinError> {
        self.session.clone().ok_or(AddinError::NotAuthenticated)
    }

    /// Restore the stored session and, when signed in, load every listing.
    pub async fn initialize(&mut self) -> Result<(), AddinError> {
        if self.restore_session().await?.is_some() {
            self.refresh_templates().await?;
            self.refresh_letters().await?;
            self.refresh_variables().await?;
        }
        Ok(())
    }

    pub async fn restore_session(&mut self) -> Result<Option<&Session>, AddinError> {
        self.session = self.store.load().await?;
        self.ui.set_session(self.session.as_ref());
        Ok(self.session.as_ref())
    }

    /// Offer a known server URL without going through discovery.
    pub fn use_server(&mut self, url: impl Into<String>) {
        self.ui.set_server_options(vec![url.into()]);
    }

    pub async fn fetch_servers(&mut self) -> Result<Vec<String>, AddinError> {
        self.ui.busy.fetch_servers = true;
        self.ui.sub_domain_locked = true;

        let result = self.discovery.fetch_servers(&self.ui.sub_domain).await;
        self.ui.busy.fetch_servers = false;

        match result {
            Ok(settings) => {
                let urls = settings.urls();
                self.ui.set_server_options(urls.clone());
                Ok(urls)
            }
            Err(e) => {
                self.status(Status::danger(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn authenticate(&mut self) -> Result<(), AddinError> {
        self.ui.busy.login = true;
        self.ui.sub_domain_locked = true;

        let server = self.ui.server_settings.clone().unwrap_or_default();
        let result = self
            .backend
            .login(&server, &self.ui.username, &self.ui.password)
            .await;
        self.ui.busy.login = false;

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                self.status(Status::danger(e.to_string()));
                return Err(e);
            }
        };

        self.session = Some(session.clone());
        self.ui.set_session(Some(&session));
        match self.store.save(&session).await {
            Ok(()) => {
                self.status(Status::success(SETTINGS_SAVED_MESSAGE));
                self.status(Status::success(LOGIN_SUCCESS_MESSAGE));
            }
            Err(e) => self.status(Status::danger(e.to_string())),
        }

        self.refresh_templates().await?;
        self.refresh_letters().await?;
        self.refresh_variables().await?;
        Ok(())
    }

    /// Forget the session. The pane only switches back to the login form once
    /// the store confirms.
    pub async fn logout(&mut self) -> Result<(), AddinError> {
        match self.store.clear().await {
            Ok(()) => {
                self.session = None;
                self.ui.set_session(None);
                self.status(Status::success(LOGOUT_SUCCESS_MESSAGE));
                Ok(())
            }
            Err(e) => {
                self.status(Status::danger(e.to_string()));
                Err(e)
            }
        }
    }

    pub async fn refresh_templates(&mut self) -> Result<(), AddinError> {
        self.refresh(Listing::Templates).await
    }

    pub async fn refresh_letters(&mut self) -> Result<(), AddinError> {
        self.refresh(Listing::Letters).await
    }

    pub async fn refresh_variables(&mut self) -> Result<(), AddinError> {
        self.refresh(Listing::Variables).await
    }

    async fn refresh(&mut self, listing: Listing) -> Result<(), AddinError> {
        let session = self.require_session()?;
        self.dropdown(listing).begin_loading();

        let result = match listing {
            Listing::Templates => self.backend.list_templates(&session).await,
            Listing::Letters => self.backend.list_letters(&session).await,
            Listing::Variables => self.backend.list_variables(&session).await.map(|vars| {
                vars.into_iter()
                    .map(|v| DocumentRef {
                        id: v.id,
                        label: v.label,
                    })
                    .collect()
            }),
        };

        match result {
            Ok(options) => {
                debug!("{:?}: {} options", listing, options.len());
                self.dropdown(listing).fill(options);
                Ok(())
            }
            Err(AddinError::Rejected(message)) => {
                debug!("{:?} rejected: {}", listing, message);
                self.status(Status::danger(TOKEN_EXPIRED_MESSAGE));
                tokio::time::sleep(self.logout_delay).await;
                if let Err(e) = self.logout().await {
                    debug!("Forced logout failed: {}", e);
                }
                Err(AddinError::Rejected(TOKEN_EXPIRED_MESSAGE.to_string()))
            }
            Err(e) => {
                self.status(Status::danger(e.to_string()));
                Err(e)
            }
        }
    }

    fn dropdown(&mut self, listing: Listing) -> &mut lateral_addin_core::ui::Dropdown {
        match listing {
            Listing::Templates => &mut self.ui.templates,
            Listing::Letters => &mut self.ui.letters,
            Listing::Variables => &mut self.ui.variables,
        }
    }

    /// Insert the selected variable as `{label}` at the end of the selection.
    pub async fn add_variable(&mut self) -> Result<Option<String>, AddinError> {
        let variable = match self.ui.variables.selected_option() {
            Some(option) => Variable {
                id: option.id.clone(),
                label: option.label.clone(),
            },
            None => return Ok(None),
        };

        let placeholder = variable.placeholder();
        if let Err(e) = self.host.insert_text_at_selection_end(&placeholder).await {
            self.status(Status::danger(e.to_string()));
            return Err(e);
        }
        debug!("Inserted {}", placeholder);
        Ok(Some(placeholder))
    }

    /// Destination of a save, read from the form when the save starts.
    fn destination(&self, target: UploadTarget) -> UploadDestination {
        match target {
            UploadTarget::Template if !self.ui.template_name.is_empty() => {
                UploadDestination::NewTemplate {
                    name: self.ui.template_name.clone(),
                }
            }
            UploadTarget::Template => UploadDestination::ExistingTemplate {
                template_id: self.ui.templates.selected_id().unwrap_or_default().to_string(),
            },
            UploadTarget::Letter => UploadDestination::Letter {
                letter_id: self.ui.letters.selected_id().unwrap_or_default().to_string(),
                case_id: self.ui.case_id.clone(),
            },
        }
    }

    pub async fn save_template_to_server(&mut self) -> Result<UploadReport, AddinError> {
        self.save_to_server(UploadTarget::Template, None).await
    }

    pub async fn save_letter_to_server(&mut self) -> Result<UploadReport, AddinError> {
        self.save_to_server(UploadTarget::Letter, None).await
    }

    /// Upload the active document. A failed upload leaves the save button
    /// spinning and the document handle open.
    pub async fn save_to_server(
        &mut self,
        target: UploadTarget,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<UploadReport, AddinError> {
        let session = self.require_session()?;
        let destination = self.destination(target);
        match target {
            UploadTarget::Template => self.ui.busy.save_template = true,
            UploadTarget::Letter => self.ui.busy.save_letter = true,
        }

        let mut uploader = SliceUploader::new(&self.backend, self.slice_size);
        if let Some(cancel) = cancel {
            uploader = uploader.with_cancel(cancel);
        }
        let result = uploader
            .upload(self.host.as_ref(), &session, destination, &mut self.ui)
            .await;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                self.status(Status::danger(e.to_string()));
                return Err(e);
            }
        };

        self.ui.busy.save_template = false;
        self.ui.busy.save_letter = false;

        if !report.closed {
            self.status(Status::danger(CLOSE_FAILED_MESSAGE));
            return Ok(report);
        }

        self.status(Status::success(UPLOAD_SUCCESS_MESSAGE));
        self.refresh_templates().await?;
        self.refresh_letters().await?;
        Ok(report)
    }

    pub async fn load_template(&mut self) -> Result<(), AddinError> {
        let template_id = self.ui.templates.selected_id().unwrap_or_default().to_string();
        self.load(&template_id, None).await
    }

    pub async fn load_letter(&mut self) -> Result<(), AddinError> {
        let letter_id = self.ui.letters.selected_id().unwrap_or_default().to_string();
        let case_id = self.ui.case_id.clone();
        self.load(&letter_id, Some(&case_id)).await
    }

    /// Replace the document body with a backend document.
    async fn load(&mut self, document_id: &str, case_id: Option<&str>) -> Result<(), AddinError> {
        let session = self.require_session()?;
        let is_letter = case_id.is_some_and(|c| !c.is_empty());
        self.set_load_busy(is_letter, true);

        let result = self
            .backend
            .load_document(&session, document_id, case_id)
            .await;
        self.set_load_busy(is_letter, false);

        let document = match result {
            Ok(document) => document,
            Err(e) => {
                self.status(Status::danger(e.to_string()));
                return Err(e);
            }
        };

        if let Err(e) = self.host.replace_body_from_base64(&document).await {
            self.status(Status::danger(e.to_string()));
            return Err(e);
        }
        info!("Loaded document {} into the active document", document_id);
        Ok(())
    }

    fn set_load_busy(&mut self, letter: bool, busy: bool) {
        if letter {
            self.ui.busy.load_letter = busy;
        } else {
            self.ui.busy.load_template = busy;
        }
    }
}
