//! Task pane form state and pure render functions.
//!
//! `UiState` holds every value the user can edit plus the data loaded from
//! the backend. `render` derives the visibility, enabled state and label of
//! every control from it; nothing else decides what the pane shows.

use serde::Serialize;

use crate::document::DocumentRef;
use crate::session::Session;

pub const LABEL_FETCH_SERVERS: &str = "Fetch Servers";
pub const LABEL_FETCHING_SERVERS: &str = "Fetching Servers...";
pub const LABEL_LOGIN: &str = "Login";
pub const LABEL_AUTHENTICATING: &str = "Authenticating...";
pub const LABEL_SAVE_TO_SERVER: &str = "Save to Server";
pub const LABEL_SAVING_TO_SERVER: &str = "Saving to Server...";
pub const LABEL_LOAD: &str = "Load";
pub const LABEL_LOADING: &str = "Loading...";
pub const LABEL_ADD_VARIABLE: &str = "Add Variable";

/// Banner colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Success,
    Danger,
}

/// The transient status banner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    pub message: String,
    pub kind: StatusKind,
}

impl Status {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: StatusKind::Success,
        }
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: StatusKind::Danger,
        }
    }
}

/// A dropdown filled from a backend listing.
#[derive(Debug, Clone, Default)]
pub struct Dropdown {
    pub options: Vec<DocumentRef>,
    pub selected: Option<usize>,
    /// Set while a listing request is in flight; the control is disabled.
    pub loading: bool,
}

impl Dropdown {
    pub fn begin_loading(&mut self) {
        self.loading = true;
    }

    /// Replace all options. The first option becomes selected, as a native
    /// select element does.
    pub fn fill(&mut self, options: Vec<DocumentRef>) {
        self.selected = if options.is_empty() { None } else { Some(0) };
        self.options = options;
        self.loading = false;
    }

    pub fn select(&mut self, id: &str) -> bool {
        match self.options.iter().position(|o| o.id == id) {
            Some(i) => {
                self.selected = Some(i);
                true
            }
            None => false,
        }
    }

    pub fn selected_option(&self) -> Option<&DocumentRef> {
        self.selected.and_then(|i| self.options.get(i))
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected_option().map(|o| o.id.as_str())
    }
}

/// Buttons currently showing a spinner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Busy {
    pub fetch_servers: bool,
    pub login: bool,
    pub save_template: bool,
    pub save_letter: bool,
    pub load_template: bool,
    pub load_letter: bool,
}

/// Everything the task pane knows about its form.
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub sub_domain: String,
    /// Locked once a server fetch or login has started
    pub sub_domain_locked: bool,
    pub server_options: Vec<String>,
    pub server_settings: Option<String>,
    pub servers_fetched: bool,
    pub username: String,
    pub password: String,
    pub template_name: String,
    pub from_existing_template: bool,
    pub case_id: String,
    pub templates: Dropdown,
    pub letters: Dropdown,
    pub variables: Dropdown,
    pub busy: Busy,
    /// Display name of the signed-in user
    pub user: Option<String>,
    pub status: Option<Status>,
    /// Every banner shown since the log was last drained, oldest first
    pub status_log: Vec<Status>,
}

/// Change and blur events the pane reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    SubDomainChanged(String),
    ServerSelected(String),
    UsernameBlurred(String),
    PasswordBlurred(String),
    TemplateNameBlurred(String),
    CaseIdBlurred(String),
    TemplateSelected(String),
    LetterSelected(String),
    VariableSelected(String),
    FromExistingTemplateToggled(bool),
}

fn filled(value: &str) -> bool {
    !value.is_empty()
}

impl UiState {
    pub fn apply(&mut self, event: UiEvent) {
        match event {
            UiEvent::SubDomainChanged(v) => self.sub_domain = v,
            UiEvent::ServerSelected(v) => {
                if self.server_options.contains(&v) {
                    self.server_settings = Some(v);
                }
            }
            UiEvent::UsernameBlurred(v) => self.username = v,
            UiEvent::PasswordBlurred(v) => self.password = v,
            UiEvent::TemplateNameBlurred(v) => self.template_name = v,
            UiEvent::CaseIdBlurred(v) => self.case_id = v,
            UiEvent::TemplateSelected(id) => {
                self.templates.select(&id);
            }
            UiEvent::LetterSelected(id) => {
                self.letters.select(&id);
            }
            UiEvent::VariableSelected(id) => {
                self.variables.select(&id);
            }
            UiEvent::FromExistingTemplateToggled(checked) => {
                self.from_existing_template = checked;
                if checked {
                    self.template_name.clear();
                }
            }
        }
    }

    /// Replace the server dropdown after a successful discovery.
    pub fn set_server_options(&mut self, options: Vec<String>) {
        self.server_settings = options.first().cloned();
        self.server_options = options;
        self.servers_fetched = true;
    }

    /// Reflect the stored session (or its absence).
    pub fn set_session(&mut self, session: Option<&Session>) {
        self.user = session.map(|s| s.name.clone());
    }

    pub fn set_status(&mut self, status: Status) {
        self.status_log.push(status.clone());
        self.status = Some(status);
    }

    pub fn drain_status_log(&mut self) -> Vec<Status> {
        std::mem::take(&mut self.status_log)
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn login_enabled(&self) -> bool {
        self.server_settings.as_deref().is_some_and(filled)
            && filled(&self.username)
            && filled(&self.password)
    }

    pub fn fetch_servers_enabled(&self) -> bool {
        filled(&self.sub_domain)
    }

    pub fn save_template_enabled(&self) -> bool {
        self.from_existing_template || filled(&self.template_name)
    }

    pub fn save_letter_enabled(&self) -> bool {
        filled(&self.case_id) && self.letters.selected_id().is_some_and(filled)
    }

    pub fn load_letter_enabled(&self) -> bool {
        self.save_letter_enabled()
    }
}

/// Rendered state of a button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ButtonView {
    pub label: String,
    pub enabled: bool,
    pub visible: bool,
}

impl ButtonView {
    fn new(idle: &str, busy_label: &str, busy: bool, enabled: bool) -> Self {
        Self {
            label: if busy { busy_label } else { idle }.to_string(),
            enabled: enabled && !busy,
            visible: true,
        }
    }

    fn hidden(mut self, hidden: bool) -> Self {
        self.visible = !hidden;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// Rendered state of a dropdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectView {
    pub enabled: bool,
    /// Spinner background shown while loading
    pub loading: bool,
    pub options: Vec<SelectOption>,
    pub selected: Option<String>,
}

impl From<&Dropdown> for SelectView {
    fn from(dropdown: &Dropdown) -> Self {
        Self {
            enabled: !dropdown.loading,
            loading: dropdown.loading,
            options: dropdown
                .options
                .iter()
                .map(|o| SelectOption {
                    value: o.id.clone(),
                    label: o.label.clone(),
                })
                .collect(),
            selected: dropdown.selected_id().map(str::to_string),
        }
    }
}

/// Everything the task pane displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct View {
    pub greeting: String,
    pub login_form_visible: bool,
    pub logout_visible: bool,
    pub main_content_visible: bool,
    pub sub_domain_enabled: bool,
    pub fetch_servers: ButtonView,
    pub server_settings: SelectView,
    pub login: ButtonView,
    pub templates: SelectView,
    pub letters: SelectView,
    pub variables: SelectView,
    pub template_name_visible: bool,
    pub select_template_visible: bool,
    pub load_template: ButtonView,
    pub save_template: ButtonView,
    pub save_letter: ButtonView,
    pub load_letter: ButtonView,
    pub add_variable: ButtonView,
    pub status: Option<Status>,
}

pub fn render(state: &UiState) -> View {
    let logged_in = state.is_logged_in();
    let existing = state.from_existing_template;

    let server_settings = SelectView {
        enabled: state.servers_fetched,
        loading: state.busy.fetch_servers,
        options: state
            .server_options
            .iter()
            .map(|url| SelectOption {
                value: url.clone(),
                label: url.clone(),
            })
            .collect(),
        selected: state.server_settings.clone(),
    };

    View {
        greeting: state
            .user
            .as_ref()
            .map(|name| format!("Hello {}!", name))
            .unwrap_or_default(),
        login_form_visible: !logged_in,
        logout_visible: logged_in,
        main_content_visible: logged_in,
        sub_domain_enabled: !state.sub_domain_locked,
        fetch_servers: ButtonView::new(
            LABEL_FETCH_SERVERS,
            LABEL_FETCHING_SERVERS,
            state.busy.fetch_servers,
            state.fetch_servers_enabled(),
        ),
        server_settings,
        login: ButtonView::new(
            LABEL_LOGIN,
            LABEL_AUTHENTICATING,
            state.busy.login,
            state.login_enabled(),
        ),
        templates: SelectView::from(&state.templates),
        letters: SelectView::from(&state.letters),
        variables: SelectView::from(&state.variables),
        template_name_visible: !existing,
        select_template_visible: existing,
        load_template: ButtonView::new(LABEL_LOAD, LABEL_LOADING, state.busy.load_template, true)
            .hidden(!existing),
        save_template: ButtonView::new(
            LABEL_SAVE_TO_SERVER,
            LABEL_SAVING_TO_SERVER,
            state.busy.save_template,
            state.save_template_enabled(),
        ),
        save_letter: ButtonView::new(
            LABEL_SAVE_TO_SERVER,
            LABEL_SAVING_TO_SERVER,
            state.busy.save_letter,
            state.save_letter_enabled(),
        ),
        load_letter: ButtonView::new(
            LABEL_LOAD,
            LABEL_LOADING,
            state.busy.load_letter,
            state.load_letter_enabled(),
        ),
        add_variable: ButtonView::new(LABEL_ADD_VARIABLE, LABEL_ADD_VARIABLE, false, true),
        status: state.status.clone(),
    }
}
