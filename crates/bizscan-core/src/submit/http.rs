//! reqwest-backed transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use tracing::debug;

use super::{OutboundBody, OutboundRequest, Transport};
use crate::error::SubmissionError;
use crate::models::config::HttpConfig;

/// HTTP transport for form and webhook submissions.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, SubmissionError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| SubmissionError::Transfer(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &HttpConfig) -> Result<Self, SubmissionError> {
        Self::new(Duration::from_secs(config.timeout_secs), &config.user_agent)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<(), SubmissionError> {
        let builder = self.client.post(&request.url);
        let builder = match &request.body {
            OutboundBody::Multipart(fields) => {
                let form = fields
                    .iter()
                    .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()));
                builder.multipart(form)
            }
            OutboundBody::Text { content_type, body } => builder
                .header(CONTENT_TYPE, *content_type)
                .body(body.clone()),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| SubmissionError::Transfer(e.to_string()))?;

        // The answer is opaque; only its arrival matters.
        debug!(status = %response.status(), url = %request.url, "Destination answered");
        Ok(())
    }
}
