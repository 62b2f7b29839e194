//! Core library for bilingual business card scanning.
//!
//! This crate provides:
//! - The canonical six-field business record and submission configuration
//! - Form and webhook mapping strategies, plus the prefilled-link parser
//! - The review-and-submit state machine driving one scan cycle
//! - The submission adapter and its HTTP transport
//! - The extraction gateway interface and a Gemini-backed implementation

pub mod error;
pub mod extract;
pub mod mapping;
pub mod models;
pub mod review;
pub mod submit;

pub use error::{BizscanError, Result};
pub use extract::{ExtractionGateway, ImageInput, LanguageMode};
pub use mapping::{FormPayload, Payload, WebhookPayload, build_payload, parse_prefilled_link};
pub use models::config::{AppConfig, FieldMapping, SubmissionConfig, SubmissionMethod};
pub use models::record::{CanonicalField, CanonicalRecord};
pub use review::{ReviewSession, SessionState};
pub use submit::{
    OutboundBody, OutboundRequest, SubmissionAdapter, SubmissionReceipt, Transport,
    apps_script_template, prepare_request,
};

#[cfg(feature = "native")]
pub use extract::GeminiGateway;

#[cfg(feature = "native")]
pub use submit::HttpTransport;
