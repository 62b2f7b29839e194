//! Gemini `generateContent` extraction gateway.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ExtractionGateway, ImageInput, LanguageMode, REQUIRED_FIELDS, build_prompt, response_schema};
use crate::error::ExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::record::CanonicalRecord;

/// Extraction gateway backed by the Gemini API.
pub struct GeminiGateway {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGateway {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, ExtractionError> {
        Self::with_timeout(api_key, model, Duration::from_secs(60))
    }

    fn with_timeout(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExtractionError::Request(e.to_string()))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
        })
    }

    /// Build a gateway from configuration, resolving the API key.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ExtractionError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| ExtractionError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(
            Self::with_timeout(api_key, &config.model, Duration::from_secs(config.timeout_secs))?
                .with_base_url(&config.base_url),
        )
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    #[serde(rename_all = "camelCase")]
    Inline { inline_data: InlineData },
    Text { text: String },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn build_request(image: &ImageInput, language: LanguageMode) -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            parts: vec![
                Part::Inline {
                    inline_data: InlineData {
                        mime_type: image.mime_type().to_string(),
                        data: BASE64.encode(image.bytes()),
                    },
                },
                Part::Text {
                    text: build_prompt(language),
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: response_schema(),
        },
    }
}

/// Pull the record out of a `generateContent` response body.
///
/// An answer without text is treated as an empty object, yielding an
/// all-empty record.
fn parse_response(body: &str) -> Result<CanonicalRecord, ExtractionError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let json = strip_code_fence(&text);
    let json = if json.is_empty() { "{}" } else { json };

    let record: CanonicalRecord = serde_json::from_str(json)
        .map_err(|e| ExtractionError::InvalidResponse(e.to_string()))?;

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .filter(|f| record.get(**f).is_empty())
        .map(|f| f.key())
        .collect();
    if !missing.is_empty() {
        debug!(?missing, "Extraction left required fields empty");
    }

    Ok(record)
}

fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => text,
    }
}

#[async_trait]
impl ExtractionGateway for GeminiGateway {
    async fn extract(
        &self,
        image: &ImageInput,
        language: LanguageMode,
    ) -> Result<CanonicalRecord, ExtractionError> {
        let start = Instant::now();
        let body = build_request(image, language);

        debug!(
            model = %self.model,
            %language,
            image_bytes = image.len(),
            "Sending extraction request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ExtractionError::Request(e.to_string()))?;

        if !status.is_success() {
            warn!(%status, "Extraction service returned an error");
            return Err(ExtractionError::Service {
                status: status.as_u16(),
                body: text,
            });
        }

        let record = parse_response(&text)?;
        debug!("Extraction finished in {:?}", start.elapsed());
        Ok(record)
    }
}
