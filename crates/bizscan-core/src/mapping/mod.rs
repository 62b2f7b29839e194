//! Translation of canonical records into destination-specific payloads.
//!
//! - the form strategy is opt-in: only fields with a mapped identifier are sent;
//! - the webhook strategy always sends all six fields, falling back to the
//!   canonical key when a field has no mapped key.

mod link;

pub use link::{ParsedLink, parse_prefilled_link};

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use crate::models::config::{FieldMapping, SubmissionConfig, SubmissionMethod};
use crate::models::record::CanonicalRecord;

/// Trait for payload-building strategies.
pub trait PayloadStrategy {
    /// The payload shape this strategy produces.
    type Output;

    /// Build a payload from a record.
    fn build(&self, record: &CanonicalRecord) -> Self::Output;
}

/// Multipart form fields keyed by destination identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormPayload {
    fields: Vec<(String, String)>,
}

impl FormPayload {
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn into_fields(self) -> Vec<(String, String)> {
        self.fields
    }
}

/// A flat JSON object keyed by destination key, in canonical field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebhookPayload {
    entries: Vec<(String, String)>,
}

impl WebhookPayload {
    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite an entry. An existing key keeps its position.
    fn insert(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => {
                warn!(key = %key, "webhook key claimed by more than one field, last value wins");
                entry.1 = value;
            }
            None => self.entries.push((key, value)),
        }
    }

    /// Serialize to the JSON text sent as the request body.
    pub fn to_json(&self) -> String {
        // Keys and values are plain strings, serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Serialize for WebhookPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Form strategy: one entry per field with a non-empty identifier.
pub struct FormStrategy<'a> {
    mapping: &'a FieldMapping,
}

impl<'a> FormStrategy<'a> {
    pub fn new(mapping: &'a FieldMapping) -> Self {
        Self { mapping }
    }
}

impl PayloadStrategy for FormStrategy<'_> {
    type Output = FormPayload;

    fn build(&self, record: &CanonicalRecord) -> FormPayload {
        let fields = record
            .fields()
            .filter_map(|(field, value)| {
                let id = self.mapping.get(field);
                (!id.is_empty()).then(|| (id.to_string(), value.to_string()))
            })
            .collect();
        FormPayload { fields }
    }
}

/// Webhook strategy: all fields, mapped key or canonical key.
pub struct WebhookStrategy<'a> {
    mapping: &'a FieldMapping,
}

impl<'a> WebhookStrategy<'a> {
    pub fn new(mapping: &'a FieldMapping) -> Self {
        Self { mapping }
    }
}

impl PayloadStrategy for WebhookStrategy<'_> {
    type Output = WebhookPayload;

    fn build(&self, record: &CanonicalRecord) -> WebhookPayload {
        let mut payload = WebhookPayload::default();
        for (field, value) in record.fields() {
            let key = match self.mapping.get(field) {
                "" => field.key(),
                mapped => mapped,
            };
            payload.insert(key.to_string(), value.to_string());
        }
        payload
    }
}

/// A payload shaped for the active submission method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Form(FormPayload),
    Webhook(WebhookPayload),
}

impl Payload {
    /// Method this payload was built for.
    pub fn method(&self) -> SubmissionMethod {
        match self {
            Payload::Form(_) => SubmissionMethod::GoogleForm,
            Payload::Webhook(_) => SubmissionMethod::Webhook,
        }
    }

    /// Number of fields carried.
    pub fn len(&self) -> usize {
        match self {
            Payload::Form(p) => p.len(),
            Payload::Webhook(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the payload for `config.method` from a record.
pub fn build_payload(record: &CanonicalRecord, config: &SubmissionConfig) -> Payload {
    let payload = match config.method {
        SubmissionMethod::GoogleForm => {
            Payload::Form(FormStrategy::new(&config.form_mapping).build(record))
        }
        SubmissionMethod::Webhook => {
            Payload::Webhook(WebhookStrategy::new(&config.webhook_mapping).build(record))
        }
    };
    debug!(method = %config.method, fields = payload.len(), "built payload");
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::record::CanonicalField;
    use pretty_assertions::assert_eq;

    fn record() -> CanonicalRecord {
        CanonicalRecord {
            company_name: "ABC Co".to_string(),
            representative_name: "Nguyen Van A".to_string(),
            position: String::new(),
            email: "a@x.com".to_string(),
            phone_number: String::new(),
            worker_count: String::new(),
        }
    }

    #[test]
    fn test_form_includes_only_mapped_fields() {
        let mapping = FieldMapping::empty()
            .with(CanonicalField::CompanyName, "entry.111")
            .with(CanonicalField::Email, "entry.222");
        let payload = FormStrategy::new(&mapping).build(&record());

        assert_eq!(
            payload.fields(),
            &[
                ("entry.111".to_string(), "ABC Co".to_string()),
                ("entry.222".to_string(), "a@x.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_form_key_present_iff_mapped() {
        let mapping = FieldMapping::empty()
            .with(CanonicalField::Position, "entry.3")
            .with(CanonicalField::WorkerCount, "  ");
        let payload = FormStrategy::new(&mapping).build(&record());

        for field in CanonicalField::ALL {
            let target = mapping.get(field);
            if target.is_empty() {
                assert!(payload.get(field.key()).is_none());
            } else {
                assert_eq!(payload.get(target), Some(record().get(field)));
            }
        }
        // Empty values are still sent for mapped fields.
        assert_eq!(payload.len(), 1);
        assert_eq!(payload.get("entry.3"), Some(""));
    }

    #[test]
    fn test_form_with_no_mapping_is_empty() {
        let payload = FormStrategy::new(&FieldMapping::empty()).build(&record());
        assert!(payload.is_empty());
    }

    #[test]
    fn test_webhook_always_has_six_entries() {
        let mapping = FieldMapping::empty().with(CanonicalField::CompanyName, "company");
        let payload = WebhookStrategy::new(&mapping).build(&record());

        assert_eq!(payload.len(), 6);
        for field in CanonicalField::ALL {
            let key = match mapping.get(field) {
                "" => field.key(),
                mapped => mapped,
            };
            assert_eq!(payload.get(key), Some(record().get(field)));
        }
    }

    #[test]
    fn test_webhook_identity_json_order() {
        let payload = WebhookStrategy::new(&FieldMapping::identity()).build(&record());
        assert_eq!(
            payload.to_json(),
            r#"{"companyName":"ABC Co","representativeName":"Nguyen Van A","position":"","email":"a@x.com","phoneNumber":"","workerCount":""}"#
        );
    }

    #[test]
    fn test_webhook_duplicate_key_last_wins() {
        let mapping = FieldMapping::identity().with(CanonicalField::Email, "companyName");
        let payload = WebhookStrategy::new(&mapping).build(&record());

        assert_eq!(payload.len(), 5);
        assert_eq!(payload.entries()[0], ("companyName".to_string(), "a@x.com".to_string()));
    }

    #[test]
    fn test_build_payload_follows_method() {
        let mut config = SubmissionConfig::default();
        assert_eq!(build_payload(&record(), &config).method(), SubmissionMethod::GoogleForm);

        config.method = SubmissionMethod::Webhook;
        let payload = build_payload(&record(), &config);
        assert_eq!(payload.method(), SubmissionMethod::Webhook);
        assert_eq!(payload.len(), 6);
    }
}
