//! Configuration structures for extraction and submission.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::record::{CanonicalField, CanonicalRecord};
use crate::extract::LanguageMode;
use crate::mapping::ParsedLink;

/// Main configuration for bizscan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Destination and field mapping configuration.
    pub submission: SubmissionConfig,

    /// Extraction service configuration.
    pub extraction: ExtractionConfig,

    /// Outbound HTTP configuration.
    pub http: HttpConfig,
}

/// The outbound transport strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionMethod {
    /// Multipart post to a Google Form `formResponse` endpoint.
    #[default]
    GoogleForm,
    /// JSON text post to a webhook (typically an Apps Script web app).
    Webhook,
}

impl fmt::Display for SubmissionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionMethod::GoogleForm => write!(f, "Google Form"),
            SubmissionMethod::Webhook => write!(f, "webhook"),
        }
    }
}

/// Association from each canonical field to a destination-specific key.
///
/// Under the form method an empty value means "unmapped, omit". Under the
/// webhook method an empty value means "use the canonical key".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMapping(CanonicalRecord);

impl FieldMapping {
    /// A mapping with every field unmapped.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A mapping sending every field under its canonical key.
    pub fn identity() -> Self {
        let mut mapping = Self::empty();
        for field in CanonicalField::ALL {
            mapping.set(field, field.key());
        }
        mapping
    }

    /// The raw mapped value for a field (trimmed, possibly empty).
    pub fn get(&self, field: CanonicalField) -> &str {
        self.0.get(field).trim()
    }

    pub fn set(&mut self, field: CanonicalField, target: impl Into<String>) {
        self.0.set(field, target);
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, field: CanonicalField, target: impl Into<String>) -> Self {
        self.set(field, target);
        self
    }

    /// Check if a field has a non-empty target.
    pub fn is_mapped(&self, field: CanonicalField) -> bool {
        !self.get(field).is_empty()
    }

    /// Iterate over `(field, target)` pairs in canonical order.
    pub fn entries(&self) -> impl Iterator<Item = (CanonicalField, &str)> + '_ {
        CanonicalField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    /// Destination keys claimed by more than one field.
    ///
    /// With `fallback` set, unmapped fields count under their canonical key,
    /// as the webhook strategy sends them.
    pub fn duplicate_targets(&self, fallback: bool) -> Vec<String> {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for (field, target) in self.entries() {
            let key = match (target.is_empty(), fallback) {
                (false, _) => target,
                (true, true) => field.key(),
                (true, false) => continue,
            };
            *counts.entry(key).or_default() += 1;
        }
        counts
            .into_iter()
            .filter(|(_, n)| *n > 1)
            .map(|(k, _)| k.to_string())
            .collect()
    }
}

/// Where and how a reviewed record is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionConfig {
    /// Active submission method.
    pub method: SubmissionMethod,

    /// The form's `formResponse` URL.
    pub form_url: String,

    /// Canonical field to `entry.NNN` identifier.
    #[serde(rename = "googleFormMapping")]
    pub form_mapping: FieldMapping,

    /// Webhook endpoint URL.
    pub webhook_url: String,

    /// Canonical field to JSON key.
    pub webhook_mapping: FieldMapping,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            method: SubmissionMethod::GoogleForm,
            form_url: String::new(),
            form_mapping: FieldMapping::empty(),
            webhook_url: String::new(),
            webhook_mapping: FieldMapping::identity(),
        }
    }
}

/// Severity of a configuration finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Saving must be refused.
    Error,
    /// Saving may proceed after confirmation.
    Warning,
}

/// A finding from [`SubmissionConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self { severity: IssueSeverity::Error, message: message.into() }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self { severity: IssueSeverity::Warning, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        self.severity == IssueSeverity::Error
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            IssueSeverity::Error => write!(f, "error: {}", self.message),
            IssueSeverity::Warning => write!(f, "warning: {}", self.message),
        }
    }
}

impl SubmissionConfig {
    /// Destination URL for the active method (may be empty).
    pub fn destination_url(&self) -> &str {
        match self.method {
            SubmissionMethod::GoogleForm => self.form_url.trim(),
            SubmissionMethod::Webhook => self.webhook_url.trim(),
        }
    }

    /// Check if the active method has a destination.
    pub fn is_configured(&self) -> bool {
        !self.destination_url().is_empty()
    }

    /// Mapping used by the active method.
    pub fn active_mapping(&self) -> &FieldMapping {
        match self.method {
            SubmissionMethod::GoogleForm => &self.form_mapping,
            SubmissionMethod::Webhook => &self.webhook_mapping,
        }
    }

    /// Replace the form mapping and URL with a parsed prefilled link.
    pub fn apply_parsed_link(&mut self, parsed: &ParsedLink) {
        self.form_mapping = parsed.mapping.clone();
        self.form_url = parsed.form_url.clone();
    }

    /// Check the configuration the way the settings save flow does.
    ///
    /// Only the active method is checked for a destination; duplicate keys
    /// are reported for both mappings.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        match self.method {
            SubmissionMethod::GoogleForm => {
                if self.form_url.trim().is_empty() {
                    issues.push(ConfigIssue::error(
                        "form URL is empty; parse a prefilled form link first",
                    ));
                }
            }
            SubmissionMethod::Webhook => {
                let url = self.webhook_url.trim();
                if url.is_empty() {
                    issues.push(ConfigIssue::error("webhook URL is empty"));
                } else if url.contains("docs.google.com/spreadsheets") {
                    issues.push(ConfigIssue::error(
                        "webhook URL points at a spreadsheet; use the Apps Script web app URL \
                         (https://script.google.com/macros/s/...)",
                    ));
                } else if !url.contains("script.google.com") {
                    issues.push(ConfigIssue::warning(
                        "webhook URL does not look like a Google Apps Script web app",
                    ));
                }
            }
        }

        for key in self.form_mapping.duplicate_targets(false) {
            issues.push(ConfigIssue::warning(format!(
                "form identifier '{}' is mapped to more than one field",
                key
            )));
        }
        for key in self.webhook_mapping.duplicate_targets(true) {
            issues.push(ConfigIssue::warning(format!(
                "webhook key '{}' is used by more than one field; the last one wins",
                key
            )));
        }

        issues
    }
}

/// Extraction service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Model name.
    pub model: String,

    /// Service base URL.
    pub base_url: String,

    /// Environment variable holding the API key.
    pub api_key_env: String,

    /// API key stored in the config file (takes precedence over the environment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default language mode for scans.
    pub language: LanguageMode,

    /// Maximum image dimension (longer side) before upload.
    pub max_image_size: u32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            api_key: None,
            language: LanguageMode::Latin,
            max_image_size: 2048,
            timeout_secs: 60,
        }
    }
}

impl ExtractionConfig {
    /// Resolve the API key from the config file or the environment.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Outbound HTTP configuration for submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Submission timeout in seconds.
    pub timeout_secs: u64,

    /// User agent sent with submissions.
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("bizscan/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
