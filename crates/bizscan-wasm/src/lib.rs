//! WASM bindings for the business card review and submission flow.
//!
//! The browser shell performs extraction and the final `fetch` itself; these
//! bindings own the state machine, the field mapping and the link parser.

use chrono::Utc;
use serde::Serialize;
use wasm_bindgen::prelude::*;

use bizscan_core::error::{ExtractionError, SubmissionError};
use bizscan_core::models::config::SubmissionConfig;
use bizscan_core::review::{Phase, ReviewSession as CoreSession};
use bizscan_core::submit::{OutboundBody, OutboundRequest, SubmissionReceipt, prepare_request};
use bizscan_core::{CanonicalField, CanonicalRecord, SessionState, build_payload};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    // Plain objects rather than ES maps.
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value
        .serialize(&serializer)
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParsedLinkJs {
    mapping: CanonicalRecord,
    form_url: String,
    unassigned: Vec<String>,
}

/// A request for the shell to send with `fetch`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestJs {
    url: String,
    /// `multipart` (send `fields` as `FormData`) or `text`.
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<Vec<(String, String)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

impl From<OutboundRequest> for RequestJs {
    fn from(request: OutboundRequest) -> Self {
        match request.body {
            OutboundBody::Multipart(fields) => Self {
                url: request.url,
                kind: "multipart",
                fields: Some(fields),
                content_type: None,
                body: None,
            },
            OutboundBody::Text { content_type, body } => Self {
                url: request.url,
                kind: "text",
                fields: None,
                content_type: Some(content_type),
                body: Some(body),
            },
        }
    }
}

/// Parse a prefilled form link into `{ mapping, formUrl, unassigned }`.
#[wasm_bindgen(js_name = parseFormLink)]
pub fn parse_form_link(url: &str) -> Result<JsValue, JsValue> {
    let parsed = bizscan_core::parse_prefilled_link(url).map_err(js_error)?;
    let mapping = CanonicalField::ALL
        .into_iter()
        .fold(CanonicalRecord::new(), |record, field| {
            record.with(field, parsed.mapping.get(field))
        });

    to_js(&ParsedLinkJs {
        mapping,
        form_url: parsed.form_url,
        unassigned: parsed.unassigned,
    })
}

/// Build the payload the configuration's active method would send.
///
/// Unlike `beginSubmit`, this works without a destination URL.
#[wasm_bindgen(js_name = buildPayload)]
pub fn build_payload_js(record: JsValue, config: JsValue) -> Result<JsValue, JsValue> {
    let record: CanonicalRecord = from_js(record)?;
    let config: SubmissionConfig = from_js(config)?;
    let url = config.destination_url().to_string();

    let request = OutboundRequest::new(url, build_payload(&record, &config));
    to_js(&RequestJs::from(request))
}

/// Check submission settings; returns `[{ severity, message }]`.
#[wasm_bindgen(js_name = validateConfig)]
pub fn validate_config(config: JsValue) -> Result<JsValue, JsValue> {
    #[derive(Serialize)]
    struct IssueJs {
        severity: &'static str,
        message: String,
    }

    let config: SubmissionConfig = from_js(config)?;
    let issues: Vec<IssueJs> = config
        .validate()
        .into_iter()
        .map(|issue| IssueJs {
            severity: if issue.is_error() { "error" } else { "warning" },
            message: issue.message,
        })
        .collect();
    to_js(&issues)
}

/// Apps Script receiver for the configuration's webhook mapping.
#[wasm_bindgen(js_name = appsScript)]
pub fn apps_script(config: JsValue) -> Result<String, JsValue> {
    let config: SubmissionConfig = from_js(config)?;
    Ok(bizscan_core::apps_script_template(&config.webhook_mapping))
}

/// Review session driven by the browser shell.
#[wasm_bindgen]
pub struct ReviewSession {
    inner: CoreSession,
    pending: Option<SubmissionReceipt>,
}

#[wasm_bindgen]
impl ReviewSession {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            inner: CoreSession::new(),
            pending: None,
        }
    }

    /// `IDLE`, `PROCESSING`, `REVIEW`, `SUCCESS` or `ERROR`.
    #[wasm_bindgen(getter)]
    pub fn state(&self) -> String {
        self.inner.state().name().to_string()
    }

    /// `extracting` or `sending` while processing.
    #[wasm_bindgen(getter)]
    pub fn phase(&self) -> Option<String> {
        match self.inner.state() {
            SessionState::Processing(Phase::Extracting) => Some("extracting".to_string()),
            SessionState::Processing(Phase::Sending) => Some("sending".to_string()),
            _ => None,
        }
    }

    #[wasm_bindgen(getter)]
    pub fn record(&self) -> Result<JsValue, JsValue> {
        to_js(self.inner.record())
    }

    #[wasm_bindgen(getter, js_name = errorMessage)]
    pub fn error_message(&self) -> Option<String> {
        self.inner.error_message().map(str::to_string)
    }

    #[wasm_bindgen(getter)]
    pub fn receipt(&self) -> Result<JsValue, JsValue> {
        match self.inner.receipt() {
            Some(receipt) => to_js(receipt),
            None => Ok(JsValue::NULL),
        }
    }

    /// Review hints for the current record.
    #[wasm_bindgen(getter)]
    pub fn warnings(&self) -> Vec<String> {
        self.inner.record().review_warnings()
    }

    #[wasm_bindgen(js_name = beginScan)]
    pub fn begin_scan(&mut self) -> Result<(), JsValue> {
        self.inner.begin_scan().map_err(js_error)
    }

    /// Complete extraction with the record returned by the service.
    #[wasm_bindgen(js_name = finishScan)]
    pub fn finish_scan(&mut self, record: JsValue) -> Result<(), JsValue> {
        let record: CanonicalRecord = from_js(record)?;
        self.inner.finish_scan(Ok(record)).map_err(js_error)
    }

    /// Complete extraction with a failure; `detail` is logged, never shown.
    #[wasm_bindgen(js_name = failScan)]
    pub fn fail_scan(&mut self, detail: &str) -> Result<(), JsValue> {
        self.inner
            .finish_scan(Err(ExtractionError::Request(detail.to_string())))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = editField)]
    pub fn edit_field(&mut self, key: &str, value: &str) -> Result<(), JsValue> {
        let field = CanonicalField::from_key(key)
            .ok_or_else(|| JsValue::from_str(&format!("unknown field '{}'", key)))?;
        self.inner.edit(field, value).map_err(js_error)
    }

    pub fn cancel(&mut self) -> Result<(), JsValue> {
        self.inner.cancel().map_err(js_error)
    }

    /// Confirm the record; returns the request to send.
    ///
    /// Throws and stays in review when no destination is configured.
    #[wasm_bindgen(js_name = beginSubmit)]
    pub fn begin_submit(&mut self, config: JsValue) -> Result<JsValue, JsValue> {
        let config: SubmissionConfig = from_js(config)?;
        let snapshot = self.inner.begin_submit(&config).map_err(js_error)?;
        let (request, fields_sent) = prepare_request(&snapshot, &config).map_err(js_error)?;

        self.pending = Some(SubmissionReceipt {
            method: config.method,
            destination: request.url.clone(),
            fields_sent,
            sent_at: Utc::now(),
        });
        to_js(&RequestJs::from(request))
    }

    /// Report whether the shell's request was dispatched.
    ///
    /// With `fetch` in `no-cors` mode the response is opaque, so `ok` should
    /// reflect only whether the request went out.
    #[wasm_bindgen(js_name = finishSubmit)]
    pub fn finish_submit(&mut self, ok: bool, detail: Option<String>) -> Result<(), JsValue> {
        let result = match (ok, self.pending.take()) {
            (true, Some(mut receipt)) => {
                receipt.sent_at = Utc::now();
                Ok(receipt)
            }
            _ => Err(SubmissionError::Transfer(
                detail.unwrap_or_else(|| "request was not sent".to_string()),
            )),
        };
        self.inner.finish_submit(result).map_err(js_error)
    }

    /// Leave `SUCCESS` or `ERROR` for a fresh `IDLE` session.
    pub fn reset(&mut self) -> Result<(), JsValue> {
        let result = match self.inner.state() {
            SessionState::Success => self.inner.next_scan(),
            _ => self.inner.retry(),
        };
        result.map_err(js_error)?;
        self.pending = None;
        Ok(())
    }
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new()
    }
}
