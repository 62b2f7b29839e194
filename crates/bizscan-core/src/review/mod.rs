//! Review-and-submit state machine.
//!
//! One [`ReviewSession`] governs a single scan cycle:
//!
//! ```text
//! Idle --select image--> Processing(extracting) --record--> Review
//!                                               --failure-> Error
//! Review --edit--> Review
//! Review --cancel--> Idle
//! Review --confirm--> Processing(sending) --ok------> Success
//!                                         --failure-> Error
//! Success --next scan--> Idle
//! Error --retry--> Idle
//! ```
//!
//! Each transition is available as a synchronous method so that a shell can
//! drive the machine around its own I/O. [`ReviewSession::scan`] and
//! [`ReviewSession::confirm`] wrap the two external calls; because they hold
//! the session mutably across the await, no other event can be applied while
//! a call is in flight.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ExtractionError, SessionError, SubmissionError};
use crate::extract::{ExtractionGateway, ImageInput, LanguageMode};
use crate::models::config::SubmissionConfig;
use crate::models::record::{CanonicalField, CanonicalRecord};
use crate::submit::{SubmissionAdapter, SubmissionReceipt, Transport};

/// Shown when extraction fails, whatever the cause.
pub const EXTRACTION_FAILED_MESSAGE: &str =
    "Could not read the image. Please try again with a clearer photo.";

/// Shown when a submission cannot be dispatched, whatever the cause.
pub const SUBMISSION_FAILED_MESSAGE: &str =
    "Sending failed. Please check the destination link in the settings.";

/// What the session is waiting on while in `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Extracting,
    Sending,
}

/// Lifecycle state of a review session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    #[default]
    Idle,
    Processing(Phase),
    Review,
    Success,
    Error,
}

impl SessionState {
    /// Short status name (`IDLE`, `PROCESSING`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "IDLE",
            SessionState::Processing(_) => "PROCESSING",
            SessionState::Review => "REVIEW",
            SessionState::Success => "SUCCESS",
            SessionState::Error => "ERROR",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Processing(Phase::Extracting) => write!(f, "extracting"),
            SessionState::Processing(Phase::Sending) => write!(f, "sending"),
            SessionState::Review => write!(f, "in review"),
            SessionState::Success => write!(f, "finished"),
            SessionState::Error => write!(f, "failed"),
        }
    }
}

/// One scan-review-submit cycle.
#[derive(Debug, Clone, Default)]
pub struct ReviewSession {
    state: SessionState,
    record: CanonicalRecord,
    error: Option<String>,
    receipt: Option<SubmissionReceipt>,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The record under review (all-empty outside a cycle).
    pub fn record(&self) -> &CanonicalRecord {
        &self.record
    }

    /// User-facing error message, set only in `Error`.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Receipt of the last successful submission, set only in `Success`.
    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    fn require(&self, expected: SessionState, event: &'static str) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                state: self.state,
                event,
            })
        }
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = %self.state, to = %to, "session transition");
        self.state = to;
    }

    fn reset(&mut self) {
        self.record = CanonicalRecord::new();
        self.error = None;
        self.receipt = None;
        self.transition(SessionState::Idle);
    }

    /// `Idle -> Processing(extracting)`: an image was selected.
    pub fn begin_scan(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Idle, "select an image")?;
        self.error = None;
        self.transition(SessionState::Processing(Phase::Extracting));
        Ok(())
    }

    /// `Processing(extracting) -> Review | Error`: the gateway answered.
    pub fn finish_scan(
        &mut self,
        result: Result<CanonicalRecord, ExtractionError>,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Processing(Phase::Extracting), "finish extraction")?;
        match result {
            Ok(record) => {
                self.record = record;
                self.transition(SessionState::Review);
            }
            Err(e) => {
                warn!("Extraction failed");
                debug!(error = %e, "Extraction error detail");
                self.error = Some(EXTRACTION_FAILED_MESSAGE.to_string());
                self.transition(SessionState::Error);
            }
        }
        Ok(())
    }

    /// `Review -> Review`: replace exactly one field.
    pub fn edit(&mut self, field: CanonicalField, value: impl Into<String>) -> Result<(), SessionError> {
        self.require(SessionState::Review, "edit a field")?;
        self.record.set(field, value);
        Ok(())
    }

    /// `Review -> Idle`: discard the record.
    pub fn cancel(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Review, "cancel")?;
        self.reset();
        Ok(())
    }

    /// `Review -> Processing(sending)`: the user confirmed.
    ///
    /// Fails with [`SessionError::NotConfigured`] and stays in `Review` when
    /// the active method has no destination. On success returns the snapshot
    /// of the record to hand to the submission adapter.
    pub fn begin_submit(&mut self, config: &SubmissionConfig) -> Result<CanonicalRecord, SessionError> {
        self.require(SessionState::Review, "confirm")?;
        if !config.is_configured() {
            info!(method = %config.method, "No destination configured, staying in review");
            return Err(SessionError::NotConfigured(config.method));
        }
        self.transition(SessionState::Processing(Phase::Sending));
        Ok(self.record.clone())
    }

    /// `Processing(sending) -> Success | Error`: the transfer finished.
    pub fn finish_submit(
        &mut self,
        result: Result<SubmissionReceipt, SubmissionError>,
    ) -> Result<(), SessionError> {
        self.require(SessionState::Processing(Phase::Sending), "finish sending")?;
        match result {
            Ok(receipt) => {
                self.receipt = Some(receipt);
                self.transition(SessionState::Success);
            }
            Err(e) => {
                warn!("Submission failed");
                debug!(error = %e, "Submission error detail");
                self.error = Some(SUBMISSION_FAILED_MESSAGE.to_string());
                self.transition(SessionState::Error);
            }
        }
        Ok(())
    }

    /// `Success -> Idle`: start the next scan with an empty record.
    pub fn next_scan(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Success, "start the next scan")?;
        self.reset();
        Ok(())
    }

    /// `Error -> Idle`: acknowledge the error.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        self.require(SessionState::Error, "retry")?;
        self.reset();
        Ok(())
    }

    /// Select an image and run extraction to completion.
    ///
    /// Ends in `Review` or `Error`; the `Err` return is reserved for events
    /// the current state does not accept.
    pub async fn scan(
        &mut self,
        gateway: &dyn ExtractionGateway,
        image: &ImageInput,
        language: LanguageMode,
    ) -> Result<(), SessionError> {
        self.begin_scan()?;
        let result = gateway.extract(image, language).await;
        self.finish_scan(result)
    }

    /// Confirm the reviewed record and run the submission to completion.
    ///
    /// Ends in `Success` or `Error`, or stays in `Review` with
    /// [`SessionError::NotConfigured`] before any network call.
    pub async fn confirm<T: Transport>(
        &mut self,
        adapter: &SubmissionAdapter<T>,
        config: &SubmissionConfig,
    ) -> Result<(), SessionError> {
        let snapshot = self.begin_submit(config)?;
        let result = adapter.submit(&snapshot, config).await;
        self.finish_submit(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::SubmissionMethod;
    use crate::submit::{OutboundBody, OutboundRequest};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct ScriptedGateway {
        result: Mutex<Option<Result<CanonicalRecord, ExtractionError>>>,
    }

    impl ScriptedGateway {
        fn ok(record: CanonicalRecord) -> Self {
            Self { result: Mutex::new(Some(Ok(record))) }
        }

        fn failing() -> Self {
            Self {
                result: Mutex::new(Some(Err(ExtractionError::Service {
                    status: 503,
                    body: "model overloaded".to_string(),
                }))),
            }
        }
    }

    #[async_trait]
    impl ExtractionGateway for ScriptedGateway {
        async fn extract(
            &self,
            _image: &ImageInput,
            _language: LanguageMode,
        ) -> Result<CanonicalRecord, ExtractionError> {
            self.result.lock().unwrap().take().expect("gateway called twice")
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<OutboundRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, request: &OutboundRequest) -> Result<(), SubmissionError> {
            self.sent.lock().unwrap().push(request.clone());
            if self.fail {
                Err(SubmissionError::Transfer("connection refused".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn image() -> ImageInput {
        ImageInput::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]).unwrap()
    }

    fn extracted() -> CanonicalRecord {
        CanonicalRecord {
            company_name: String::new(),
            representative_name: "Nguyen Van A".to_string(),
            position: String::new(),
            email: "a@x.com".to_string(),
            phone_number: String::new(),
            worker_count: String::new(),
        }
    }

    fn webhook_config() -> SubmissionConfig {
        SubmissionConfig {
            method: SubmissionMethod::Webhook,
            webhook_url: "https://script.google.com/macros/s/abc/exec".to_string(),
            ..Default::default()
        }
    }

    fn in_review() -> ReviewSession {
        let mut session = ReviewSession::new();
        session.begin_scan().unwrap();
        session.finish_scan(Ok(extracted())).unwrap();
        session
    }

    #[test]
    fn test_idle_accepts_only_image_selection() {
        let mut session = ReviewSession::new();
        let config = webhook_config();

        assert!(session.edit(CanonicalField::Email, "x").is_err());
        assert!(session.cancel().is_err());
        assert!(session.begin_submit(&config).is_err());
        assert!(session.next_scan().is_err());
        assert!(session.retry().is_err());
        assert!(session.finish_scan(Ok(extracted())).is_err());
        assert_eq!(session.state(), SessionState::Idle);

        session.begin_scan().unwrap();
        assert_eq!(session.state(), SessionState::Processing(Phase::Extracting));
    }

    #[test]
    fn test_processing_rejects_edits() {
        let mut session = ReviewSession::new();
        session.begin_scan().unwrap();

        let err = session.edit(CanonicalField::CompanyName, "x").unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidTransition {
                state: SessionState::Processing(Phase::Extracting),
                event: "edit a field",
            }
        );
        assert!(session.begin_scan().is_err());
        assert!(session.cancel().is_err());
        assert!(session.record().is_empty());
    }

    #[test]
    fn test_edit_and_cancel() {
        let mut session = in_review();
        session.edit(CanonicalField::CompanyName, "ABC Co").unwrap();
        assert_eq!(session.record(), &extracted().with(CanonicalField::CompanyName, "ABC Co"));

        session.cancel().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.record().is_empty());
    }

    #[test]
    fn test_confirm_without_destination_stays_in_review() {
        let mut session = in_review();
        let config = SubmissionConfig::default();

        let err = session.begin_submit(&config).unwrap_err();
        assert_eq!(err, SessionError::NotConfigured(SubmissionMethod::GoogleForm));
        assert_eq!(session.state(), SessionState::Review);
        assert_eq!(session.record(), &extracted());
    }

    #[tokio::test]
    async fn test_confirm_without_destination_never_sends() {
        let mut session = in_review();
        let adapter = SubmissionAdapter::new(RecordingTransport::default());
        let config = SubmissionConfig {
            method: SubmissionMethod::Webhook,
            ..Default::default()
        };

        let err = session.confirm(&adapter, &config).await.unwrap_err();
        assert_eq!(err, SessionError::NotConfigured(SubmissionMethod::Webhook));
        assert_eq!(session.state(), SessionState::Review);
        assert!(adapter.transport().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_edit_confirm_webhook() {
        let mut session = ReviewSession::new();
        let gateway = ScriptedGateway::ok(extracted());

        session.scan(&gateway, &image(), LanguageMode::Latin).await.unwrap();
        assert_eq!(session.state(), SessionState::Review);
        assert_eq!(session.record(), &extracted());

        session.edit(CanonicalField::CompanyName, "ABC Co").unwrap();

        let adapter = SubmissionAdapter::new(RecordingTransport::default());
        session.confirm(&adapter, &webhook_config()).await.unwrap();
        assert_eq!(session.state(), SessionState::Success);

        let sent = adapter.transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].url, "https://script.google.com/macros/s/abc/exec");
        match &sent[0].body {
            OutboundBody::Text { content_type, body } => {
                assert_eq!(*content_type, "text/plain;charset=utf-8");
                assert_eq!(
                    body,
                    r#"{"companyName":"ABC Co","representativeName":"Nguyen Van A","position":"","email":"a@x.com","phoneNumber":"","workerCount":""}"#
                );
            }
            other => panic!("expected text body, got {:?}", other),
        }

        let receipt = session.receipt().unwrap();
        assert_eq!(receipt.method, SubmissionMethod::Webhook);
        assert_eq!(receipt.fields_sent, 6);

        session.next_scan().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.record().is_empty());
        assert!(session.receipt().is_none());
    }

    #[tokio::test]
    async fn test_extraction_failure() {
        let mut session = ReviewSession::new();
        let gateway = ScriptedGateway::failing();

        session.scan(&gateway, &image(), LanguageMode::Korean).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.error_message(), Some(EXTRACTION_FAILED_MESSAGE));
        assert!(!session.error_message().unwrap().contains("overloaded"));

        session.retry().unwrap();
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.error_message(), None);
        assert!(session.record().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure_keeps_record_until_retry() {
        let mut session = in_review();
        let adapter = SubmissionAdapter::new(RecordingTransport {
            fail: true,
            ..Default::default()
        });

        session.confirm(&adapter, &webhook_config()).await.unwrap();
        assert_eq!(session.state(), SessionState::Error);
        assert_eq!(session.error_message(), Some(SUBMISSION_FAILED_MESSAGE));
        assert_ne!(SUBMISSION_FAILED_MESSAGE, EXTRACTION_FAILED_MESSAGE);
        assert_eq!(session.record(), &extracted());
        assert!(session.edit(CanonicalField::Email, "x").is_err());

        session.retry().unwrap();
        assert!(session.record().is_empty());
    }

    #[test]
    fn test_sending_phase_rejects_events() {
        let mut session = in_review();
        session.begin_submit(&webhook_config()).unwrap();
        assert_eq!(session.state(), SessionState::Processing(Phase::Sending));

        assert!(session.edit(CanonicalField::Email, "x").is_err());
        assert!(session.cancel().is_err());
        assert!(session.finish_scan(Ok(extracted())).is_err());
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(std::sync::Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failure_detail_stays_out_of_warn_output() {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut session = ReviewSession::new();
            session.begin_scan().unwrap();
            session
                .finish_scan(Err(ExtractionError::Service {
                    status: 503,
                    body: "model overloaded".to_string(),
                }))
                .unwrap();
            session.retry().unwrap();

            let mut session = in_review();
            session.begin_submit(&webhook_config()).unwrap();
            session
                .finish_submit(Err(SubmissionError::Transfer("dns lookup failed".to_string())))
                .unwrap();
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Extraction failed"));
        assert!(output.contains("Submission failed"));
        assert!(!output.contains("model overloaded"));
        assert!(!output.contains("dns lookup failed"));
    }

    #[test]
    fn test_state_names() {
        assert_eq!(SessionState::Processing(Phase::Sending).name(), "PROCESSING");
        assert_eq!(SessionState::Review.to_string(), "in review");
    }
}
