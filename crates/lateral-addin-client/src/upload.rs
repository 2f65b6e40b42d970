//! Sequential slice upload of the active document.
//!
//! `start -> get slice -> send slice -> (more slices ? get slice : close)`.
//! Any failed step abandons the upload: the file handle is dropped without
//! being closed and nothing is retried.

use std::future::Future;

use lateral_addin_core::ui::{Status, UiState};
use lateral_addin_core::{
    AddinError, HostDocument, Session, UploadDestination, UploadState, UploadTarget,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::backend::BackendClient;

pub const CLOSE_FAILED_MESSAGE: &str = "File couldn't be saved to the server.";

/// Receives progress messages while an upload runs.
pub trait StatusSink {
    fn status(&mut self, status: Status);
}

impl StatusSink for UiState {
    fn status(&mut self, status: Status) {
        self.set_status(status);
    }
}

impl StatusSink for Vec<Status> {
    fn status(&mut self, status: Status) {
        self.push(status);
    }
}

/// Outcome of an upload whose slices were all accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub target: UploadTarget,
    pub slices_sent: u32,
    pub bytes_sent: u64,
    pub filename: Option<String>,
    /// Whether the host released the file handle afterwards
    pub closed: bool,
}

/// Sends the active document to a create endpoint, one slice at a time.
pub struct SliceUploader<'a> {
    backend: &'a BackendClient,
    slice_size: usize,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a> SliceUploader<'a> {
    pub fn new(backend: &'a BackendClient, slice_size: usize) -> Self {
        Self {
            backend,
            slice_size,
            cancel: None,
        }
    }

    /// Stop before the next slice once `cancel` turns true.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run one upload step, abandoning it as soon as `cancel` turns true.
    async fn cancellable<T>(
        &self,
        step: impl Future<Output = Result<T, AddinError>>,
    ) -> Result<T, AddinError> {
        let Some(cancel) = &self.cancel else {
            return step.await;
        };
        let mut cancel = cancel.clone();
        tokio::select! {
            result = step => result,
            Ok(_) = cancel.wait_for(|&cancelled| cancelled) => Err(AddinError::Cancelled),
        }
    }

    #[instrument(skip(self, host, session, sink), level = "debug", fields(upload_target = %destination.target()))]
    pub async fn upload(
        &self,
        host: &dyn HostDocument,
        session: &Session,
        destination: UploadDestination,
        sink: &mut (dyn StatusSink + Send),
    ) -> Result<UploadReport, AddinError> {
        let mut file = host.get_file(self.slice_size).await?;
        let mut state = UploadState::new(destination, file.slice_count());
        sink.status(Status::success(format!(
            "Getting file of {} bytes",
            file.size()
        )));

        let mut bytes_sent = 0u64;
        loop {
            if self.is_cancelled() {
                warn!(
                    "Upload cancelled before slice {} of {}",
                    state.slice_no(),
                    state.slice_count
                );
                return Err(AddinError::Cancelled);
            }

            let slice = self.cancellable(file.get_slice(state.counter)).await?;
            sink.status(Status::success(format!(
                "Sending piece {} of {}",
                state.slice_no(),
                state.slice_count
            )));

            if slice.data.is_empty() {
                return Err(AddinError::Host(format!(
                    "Slice {} of {} is empty",
                    state.slice_no(),
                    state.slice_count
                )));
            }

            let receipt = match self
                .cancellable(self.backend.create_slice(session, &state, &slice))
                .await
            {
                Err(AddinError::Cancelled) => {
                    warn!(
                        "Upload cancelled while sending slice {} of {}",
                        state.slice_no(),
                        state.slice_count
                    );
                    return Err(AddinError::Cancelled);
                }
                other => other?,
            };
            bytes_sent += slice.size() as u64;
            sink.status(Status::success(format!("Sent {} bytes.", slice.size())));

            state.advance();
            if state.is_complete() {
                break;
            }

            match receipt.filename {
                Some(filename) => {
                    sink.status(Status::success(format!("file name:{}", filename)));
                    state.filename = Some(filename);
                }
                None => sink.status(Status::danger("file not created.")),
            }
            debug!("Slice {} of {} accepted", state.counter, state.slice_count);
        }

        let closed = match file.close().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to close document after upload: {}", e);
                false
            }
        };

        info!(
            "Uploaded {} ({} slices, {} bytes) in {}ms",
            state.target(),
            state.counter,
            bytes_sent,
            (chrono::Utc::now() - state.started_at).num_milliseconds()
        );

        Ok(UploadReport {
            target: state.target(),
            slices_sent: state.counter,
            bytes_sent,
            filename: state.filename,
            closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingHost;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session(server: &MockServer) -> Session {
        Session {
            token: "tok-1".to_string(),
            name: "Jo".to_string(),
            server: format!("{}/", server.uri()),
        }
    }

    fn new_template() -> UploadDestination {
        UploadDestination::NewTemplate {
            name: "Welcome".to_string(),
        }
    }

    fn body_of(request: &wiremock::Request) -> String {
        String::from_utf8_lossy(&request.body).to_string()
    }

    #[tokio::test]
    async fn test_divisible_size_sends_exact_slice_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/b/system/v3/template/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true,
                "filename": "tmp-1.docx"
            })))
            .expect(3)
            .mount(&server)
            .await;

        let host = RecordingHost::new(vec![1u8; 12]);
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let report = SliceUploader::new(&backend, 4)
            .upload(&host, &session(&server), new_template(), &mut statuses)
            .await
            .unwrap();

        assert_eq!(report.slices_sent, 3);
        assert_eq!(report.bytes_sent, 12);
        assert!(report.closed);
        assert!(host.is_closed());
        assert_eq!(statuses[0], Status::success("Getting file of 12 bytes"));
        assert!(statuses.contains(&Status::success("Sending piece 3 of 3")));
    }

    #[tokio::test]
    async fn test_filename_from_first_slice_sent_with_later_slices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/b/system/v3/template/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true,
                "filename": "tmp-1.docx"
            })))
            .mount(&server)
            .await;

        let host = RecordingHost::new((0u8..10).collect());
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let report = SliceUploader::new(&backend, 4)
            .upload(&host, &session(&server), new_template(), &mut statuses)
            .await
            .unwrap();
        assert_eq!(report.filename.as_deref(), Some("tmp-1.docx"));

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 3);
        assert!(!body_of(&requests[0]).contains("name=\"file_name\""));
        assert!(body_of(&requests[1]).contains("name=\"file_name\"\r\n\r\ntmp-1.docx"));
        assert!(body_of(&requests[2]).contains("name=\"slice_no\"\r\n\r\n3"));
        // final slice is the 2-byte remainder
        assert!(body_of(&requests[2]).contains("name=\"letter_data\"\r\n\r\n8,9\r\n"));
        assert!(body_of(&requests[0]).contains("name=\"letter_name\"\r\n\r\nWelcome"));
        assert!(statuses.contains(&Status::success("file name:tmp-1.docx")));
    }

    #[tokio::test]
    async fn test_missing_filename_reports_not_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/b/system/v3/template/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .mount(&server)
            .await;

        let host = RecordingHost::new(vec![1u8; 8]);
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let report = SliceUploader::new(&backend, 4)
            .upload(&host, &session(&server), new_template(), &mut statuses)
            .await
            .unwrap();

        assert_eq!(report.slices_sent, 2);
        assert!(statuses.contains(&Status::danger("file not created.")));
    }

    #[tokio::test]
    async fn test_rejected_slice_abandons_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/b/system/v3/letter/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": false,
                "message": "Case not found"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let host = RecordingHost::new(vec![1u8; 8]);
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let err = SliceUploader::new(&backend, 4)
            .upload(
                &host,
                &session(&server),
                UploadDestination::Letter {
                    letter_id: "1".to_string(),
                    case_id: "C-404".to_string(),
                },
                &mut statuses,
            )
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Case not found");
        assert!(!host.is_closed());
    }

    #[tokio::test]
    async fn test_close_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/b/system/v3/template/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .mount(&server)
            .await;

        let host = RecordingHost::new(vec![1u8; 3]).failing_close();
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let report = SliceUploader::new(&backend, 4)
            .upload(&host, &session(&server), new_template(), &mut statuses)
            .await
            .unwrap();

        assert_eq!(report.slices_sent, 1);
        assert!(!report.closed);
    }

    #[tokio::test]
    async fn test_empty_filename_reports_not_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/b/system/v3/template/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true,
                "filename": ""
            })))
            .mount(&server)
            .await;

        let host = RecordingHost::new(vec![1u8; 8]);
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let report = SliceUploader::new(&backend, 4)
            .upload(&host, &session(&server), new_template(), &mut statuses)
            .await
            .unwrap();

        assert_eq!(report.filename, None);
        assert!(statuses.contains(&Status::danger("file not created.")));
        assert!(!statuses.iter().any(|s| s.message.starts_with("file name:")));
        let requests = server.received_requests().await.unwrap();
        assert!(!body_of(&requests[1]).contains("name=\"file_name\""));
    }

    #[tokio::test]
    async fn test_cancel_abandons_pending_slice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/b/system/v3/template/create"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": true}))
                    .set_delay(Duration::from_secs(60)),
            )
            .mount(&server)
            .await;

        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let _ = tx.send(true);
        });

        let host = RecordingHost::new(vec![1u8; 8]);
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let started = std::time::Instant::now();
        let err = SliceUploader::new(&backend, 4)
            .with_cancel(rx)
            .upload(&host, &session(&server), new_template(), &mut statuses)
            .await
            .unwrap_err();

        assert!(matches!(err, AddinError::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(!host.is_closed());
        assert!(statuses.contains(&Status::success("Sending piece 1 of 2")));
    }

    #[tokio::test]
    async fn test_cancelled_upload_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(0)
            .mount(&server)
            .await;

        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let host = RecordingHost::new(vec![1u8; 8]);
        let backend = BackendClient::new();
        let mut statuses: Vec<Status> = Vec::new();
        let err = SliceUploader::new(&backend, 4)
            .with_cancel(rx)
            .upload(&host, &session(&server), new_template(), &mut statuses)
            .await
            .unwrap_err();

        assert!(matches!(err, AddinError::Cancelled));
        assert!(!host.is_closed());
    }
}
