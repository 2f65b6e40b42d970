//! Lateral backend REST client.
//!
//! Stateless: the session is passed to every authorized call. Every endpoint
//! answers with a JSON envelope `{result, data, message, filename}`; the HTTP
//! status is not consulted.

use lateral_addin_core::{
    listing_entries, AddinError, DocumentRef, Session, Slice, UploadState, Variable,
};
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

pub const ACCEPT: &str = "application/json, text/plain, */*";
const AUTHORISATION: &str = "authorisation";

const LIST_DOCUMENTS_PATH: &str = "b/system/v3/letter/get_letter_details";
const LIST_VARIABLES_PATH: &str = "b/system/v3/letter/get_variable_list";
const LOGIN_PATH: &str = "b/system/v1/session/login";
const LOAD_TEMPLATE_PATH: &str = "b/system/v3/template/load_template";

/// Response envelope shared by every backend endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub filename: Option<String>,
}

impl ApiResponse {
    /// Whether `result` is truthy.
    pub fn is_ok(&self) -> bool {
        match &self.result {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    pub fn message_text(&self) -> String {
        match &self.message {
            Value::Null => "Request failed".to_string(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// `data` of a successful response, or the server message as an error.
    pub fn into_data(self) -> Result<Value, AddinError> {
        if self.is_ok() {
            Ok(self.data)
        } else {
            Err(AddinError::Rejected(self.message_text()))
        }
    }
}

/// Result of one accepted slice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliceReceipt {
    pub filename: Option<String>,
}

#[derive(Deserialize)]
struct LoginData {
    remote_token: String,
    #[serde(default)]
    name: String,
}

/// Encode slice bytes the way the task pane's form serialization sends a
/// byte array: decimal values joined by commas.
pub fn encode_slice_data(data: &[u8]) -> String {
    data.iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Lateral backend client.
#[derive(Clone)]
pub struct BackendClient {
    http: Client,
}

impl Default for BackendClient {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    fn authorized(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        builder
            .header(AUTHORISATION, session.token.as_str())
            .header(reqwest::header::ACCEPT, ACCEPT)
    }

    async fn read(response: Response) -> Result<ApiResponse, AddinError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AddinError::Http(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| {
            AddinError::InvalidResponse(format!("HTTP {}: {} ({})", status, e, body))
        })
    }

    async fn get(&self, session: &Session, path: &str) -> Result<ApiResponse, AddinError> {
        let response = self
            .authorized(self.http.get(session.endpoint(path)), session)
            .send()
            .await
            .map_err(|e| AddinError::Http(e.to_string()))?;
        Self::read(response).await
    }

    /// Templates and letters share one listing endpoint.
    async fn list_documents(&self, session: &Session) -> Result<Vec<DocumentRef>, AddinError> {
        let data = self.get(session, LIST_DOCUMENTS_PATH).await?.into_data()?;
        let entries = listing_entries(&data).ok_or_else(|| {
            AddinError::InvalidResponse("document listing is not an object or array".to_string())
        })?;
        let docs: Vec<DocumentRef> = entries.into_iter().map(Into::into).collect();
        debug!("Listed {} documents", docs.len());
        Ok(docs)
    }

    #[instrument(skip(self, session), level = "debug")]
    pub async fn list_templates(&self, session: &Session) -> Result<Vec<DocumentRef>, AddinError> {
        self.list_documents(session).await
    }

    #[instrument(skip(self, session), level = "debug")]
    pub async fn list_letters(&self, session: &Session) -> Result<Vec<DocumentRef>, AddinError> {
        self.list_documents(session).await
    }

    #[instrument(skip(self, session), level = "debug")]
    pub async fn list_variables(&self, session: &Session) -> Result<Vec<Variable>, AddinError> {
        let data = self.get(session, LIST_VARIABLES_PATH).await?.into_data()?;
        let entries = data
            .get("letter_variables_list")
            .and_then(listing_entries)
            .ok_or_else(|| {
                AddinError::InvalidResponse("missing data.letter_variables_list".to_string())
            })?;
        let variables: Vec<Variable> = entries.into_iter().map(Into::into).collect();
        debug!("Listed {} variables", variables.len());
        Ok(variables)
    }

    /// Authenticate against `server` and build the resulting session.
    #[instrument(skip(self, password), level = "debug")]
    pub async fn login(
        &self,
        server: &str,
        username: &str,
        password: &str,
    ) -> Result<Session, AddinError> {
        let form = Form::new()
            .text("username", username.to_string())
            .text("password", password.to_string());

        let response = self
            .http
            .post(format!("{}{}", server, LOGIN_PATH))
            .header(reqwest::header::ACCEPT, ACCEPT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AddinError::Http(e.to_string()))?;

        let data = Self::read(response).await?.into_data()?;
        let login: LoginData = serde_json::from_value(data)?;

        debug!("Logged in as {}", login.name);
        Ok(Session {
            token: login.remote_token,
            name: login.name,
            server: server.to_string(),
        })
    }

    /// Send one slice to `{server}b/system/v3/{type}/create`.
    #[instrument(
        skip(self, session, state, slice),
        level = "debug",
        fields(upload_target = %state.target(), slice_no = state.slice_no(), data_len = slice.size())
    )]
    pub async fn create_slice(
        &self,
        session: &Session,
        state: &UploadState,
        slice: &Slice,
    ) -> Result<SliceReceipt, AddinError> {
        let mut form = Form::new()
            .text("letter_data", encode_slice_data(&slice.data))
            .text("max_slice", state.slice_count.to_string())
            .text("slice_no", state.slice_no().to_string());

        for (name, value) in state.destination.form_fields() {
            form = form.text(name, value);
        }

        if let Some(filename) = &state.filename {
            form = form.text("file_name", filename.clone());
        }

        let url = session.endpoint(&format!("b/system/v3/{}/create", state.target()));
        let response = self
            .authorized(self.http.post(url), session)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AddinError::Http(e.to_string()))?;

        let api = Self::read(response).await?;
        if !api.is_ok() {
            return Err(AddinError::Rejected(api.message_text()));
        }

        Ok(SliceReceipt {
            filename: api.filename.filter(|f| !f.is_empty()),
        })
    }

    /// Fetch a template (or, with `case_id`, a letter) as a base64 document.
    #[instrument(skip(self, session), level = "debug")]
    pub async fn load_document(
        &self,
        session: &Session,
        document_id: &str,
        case_id: Option<&str>,
    ) -> Result<String, AddinError> {
        let mut query = vec![("template_id", document_id)];
        if let Some(case_id) = case_id.filter(|c| !c.is_empty()) {
            query.push(("caseid", case_id));
        }

        let response = self
            .authorized(
                self.http.get(session.endpoint(LOAD_TEMPLATE_PATH)).query(&query),
                session,
            )
            .send()
            .await
            .map_err(|e| AddinError::Http(e.to_string()))?;

        match Self::read(response).await?.into_data()? {
            Value::String(document) => {
                debug!("Loaded document {} ({} base64 chars)", document_id, document.len());
                Ok(document)
            }
            other => Err(AddinError::InvalidResponse(format!(
                "expected base64 string, got {}",
                other
            ))),
        }
    }
}
