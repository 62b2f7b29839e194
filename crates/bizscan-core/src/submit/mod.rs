//! Submission adapter: delivers a reviewed record to the configured destination.
//!
//! Form submissions are multipart posts of `entry.NNN` fields. Webhook
//! submissions are a JSON object sent as `text/plain`. The destination's
//! answer is never inspected: a submission succeeds once the request has been
//! dispatched, whatever the response status.

#[cfg(feature = "native")]
mod http;

#[cfg(feature = "native")]
pub use http::HttpTransport;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::SubmissionError;
use crate::mapping::{Payload, build_payload};
use crate::models::config::{FieldMapping, SubmissionConfig, SubmissionMethod};
use crate::models::record::CanonicalRecord;

/// Content type of webhook bodies.
pub const WEBHOOK_CONTENT_TYPE: &str = "text/plain;charset=utf-8";

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    /// `multipart/form-data` text fields, in order.
    Multipart(Vec<(String, String)>),
    /// A raw text body with an explicit content type.
    Text {
        content_type: &'static str,
        body: String,
    },
}

/// A fully prepared POST request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub url: String,
    pub body: OutboundBody,
}

impl OutboundRequest {
    /// Shape a payload into the request its method calls for.
    pub fn new(url: impl Into<String>, payload: Payload) -> Self {
        let body = match payload {
            Payload::Form(form) => OutboundBody::Multipart(form.into_fields()),
            Payload::Webhook(webhook) => OutboundBody::Text {
                content_type: WEBHOOK_CONTENT_TYPE,
                body: webhook.to_json(),
            },
        };
        Self {
            url: url.into(),
            body,
        }
    }

    /// Number of fields carried by a multipart body, or `None` for text.
    pub fn multipart_len(&self) -> Option<usize> {
        match &self.body {
            OutboundBody::Multipart(fields) => Some(fields.len()),
            OutboundBody::Text { .. } => None,
        }
    }
}

/// Trait for outbound transports.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch a request. Only failures to transfer are errors.
    async fn send(&self, request: &OutboundRequest) -> Result<(), SubmissionError>;
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub method: SubmissionMethod,
    pub destination: String,
    pub fields_sent: usize,
    pub sent_at: DateTime<Utc>,
}

/// Build the request for the active method without sending it.
///
/// Returns the request and the number of fields it carries.
pub fn prepare_request(
    record: &CanonicalRecord,
    config: &SubmissionConfig,
) -> Result<(OutboundRequest, usize), SubmissionError> {
    if !config.is_configured() {
        return Err(SubmissionError::NotConfigured(config.method));
    }
    let payload = build_payload(record, config);
    let fields = payload.len();
    Ok((OutboundRequest::new(config.destination_url(), payload), fields))
}

/// Apps Script web app that appends each webhook submission to a sheet.
///
/// Columns are a timestamp followed by the six fields in canonical order,
/// read under the keys `mapping` sends them as.
pub fn apps_script_template(mapping: &FieldMapping) -> String {
    let columns: Vec<String> = mapping
        .entries()
        .map(|(field, key)| {
            let key = if key.is_empty() { field.key() } else { key };
            format!("    data[{}],", serde_json::Value::from(key))
        })
        .collect();

    format!(
        "function doPost(e) {{\n\
         \x20 var sheet = SpreadsheetApp.getActiveSpreadsheet().getActiveSheet();\n\
         \x20 // The body arrives as text/plain; parse it as JSON.\n\
         \x20 var data = JSON.parse(e.postData.contents);\n\
         \x20 sheet.appendRow([\n\
         \x20   new Date(),\n\
         {columns}\n\
         \x20 ]);\n\
         \x20 return ContentService.createTextOutput(\"Success\")\n\
         \x20   .setMimeType(ContentService.MimeType.TEXT);\n\
         }}\n",
        columns = columns.join("\n")
    )
}

/// Builds payloads and hands them to a [`Transport`].
pub struct SubmissionAdapter<T> {
    transport: T,
}

impl<T: Transport> SubmissionAdapter<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send a record to the destination of the active method.
    pub async fn submit(
        &self,
        record: &CanonicalRecord,
        config: &SubmissionConfig,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let (request, fields_sent) = prepare_request(record, config)?;
        debug!(method = %config.method, url = %request.url, fields_sent, "Submitting record");

        self.transport.send(&request).await?;

        info!("Submitted {} field(s) via {}", fields_sent, config.method);
        Ok(SubmissionReceipt {
            method: config.method,
            destination: request.url,
            fields_sent,
            sent_at: Utc::now(),
        })
    }
}
