//! The canonical business card record.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

lazy_static! {
    static ref EMAIL: Regex = Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"
    ).unwrap();
}

/// One of the six fixed business card attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    CompanyName,
    RepresentativeName,
    Position,
    Email,
    PhoneNumber,
    WorkerCount,
}

impl CanonicalField {
    /// Every canonical field, in display and payload order.
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::CompanyName,
        CanonicalField::RepresentativeName,
        CanonicalField::Position,
        CanonicalField::Email,
        CanonicalField::PhoneNumber,
        CanonicalField::WorkerCount,
    ];

    /// The canonical key used in JSON and as the webhook fallback key.
    pub fn key(&self) -> &'static str {
        match self {
            CanonicalField::CompanyName => "companyName",
            CanonicalField::RepresentativeName => "representativeName",
            CanonicalField::Position => "position",
            CanonicalField::Email => "email",
            CanonicalField::PhoneNumber => "phoneNumber",
            CanonicalField::WorkerCount => "workerCount",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            CanonicalField::CompanyName => "Company name",
            CanonicalField::RepresentativeName => "Representative",
            CanonicalField::Position => "Position",
            CanonicalField::Email => "Email",
            CanonicalField::PhoneNumber => "Phone number",
            CanonicalField::WorkerCount => "Worker count",
        }
    }

    /// Look up a field by its canonical key.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_key(s.trim()).ok_or_else(|| {
            let keys: Vec<&str> = Self::ALL.iter().map(|f| f.key()).collect();
            format!("unknown field '{}' (expected one of: {})", s, keys.join(", "))
        })
    }
}

/// A scanned business entity.
///
/// Every field is a string; an empty string means "not found". Fields missing
/// from incoming JSON default to empty, and `null` or numeric values are
/// accepted and normalized to strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CanonicalRecord {
    #[serde(deserialize_with = "lenient_string")]
    pub company_name: String,

    #[serde(deserialize_with = "lenient_string")]
    pub representative_name: String,

    #[serde(deserialize_with = "lenient_string")]
    pub position: String,

    #[serde(deserialize_with = "lenient_string")]
    pub email: String,

    #[serde(deserialize_with = "lenient_string")]
    pub phone_number: String,

    #[serde(deserialize_with = "lenient_string")]
    pub worker_count: String,
}

impl CanonicalRecord {
    /// Create an all-empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value of a field.
    pub fn get(&self, field: CanonicalField) -> &str {
        match field {
            CanonicalField::CompanyName => &self.company_name,
            CanonicalField::RepresentativeName => &self.representative_name,
            CanonicalField::Position => &self.position,
            CanonicalField::Email => &self.email,
            CanonicalField::PhoneNumber => &self.phone_number,
            CanonicalField::WorkerCount => &self.worker_count,
        }
    }

    /// Replace the value of exactly one field.
    pub fn set(&mut self, field: CanonicalField, value: impl Into<String>) {
        let slot = match field {
            CanonicalField::CompanyName => &mut self.company_name,
            CanonicalField::RepresentativeName => &mut self.representative_name,
            CanonicalField::Position => &mut self.position,
            CanonicalField::Email => &mut self.email,
            CanonicalField::PhoneNumber => &mut self.phone_number,
            CanonicalField::WorkerCount => &mut self.worker_count,
        };
        *slot = value.into();
    }

    /// Builder-style variant of [`set`](Self::set).
    pub fn with(mut self, field: CanonicalField, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Iterate over `(field, value)` pairs in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (CanonicalField, &str)> + '_ {
        CanonicalField::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    /// Check if every field is empty.
    pub fn is_empty(&self) -> bool {
        self.fields().all(|(_, v)| v.is_empty())
    }

    /// Fields that are still empty.
    pub fn missing_fields(&self) -> Vec<CanonicalField> {
        self.fields()
            .filter(|(_, v)| v.trim().is_empty())
            .map(|(f, _)| f)
            .collect()
    }

    /// Non-blocking hints shown while the record is under review.
    pub fn review_warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.company_name.trim().is_empty() {
            warnings.push("Company name is empty. Please fill it in.".to_string());
        }

        let email = self.email.trim();
        if !email.is_empty() && !EMAIL.is_match(email) {
            warnings.push(format!("Email '{}' does not look like an address.", email));
        }

        warnings
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
