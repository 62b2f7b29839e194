//! Prefilled form link parsing.
//!
//! A prefilled link carries one `entry.NNN=<sample>` query parameter per
//! question. The sample values typed by the user are matched against keyword
//! sets to guess which canonical field each identifier belongs to. This is a
//! heuristic; unmatched or misclassified identifiers are fixed by hand.

use tracing::debug;
use url::Url;

use crate::error::LinkParseError;
use crate::models::config::FieldMapping;
use crate::models::record::CanonicalField;

/// Query parameter prefix of form question identifiers.
pub const ENTRY_PREFIX: &str = "entry.";

/// Submission endpoint suffix of a form URL.
pub const FORM_RESPONSE_SUFFIX: &str = "formResponse";

/// Link suffixes rewritten to [`FORM_RESPONSE_SUFFIX`].
const LINK_SUFFIXES: [&str; 2] = ["viewform", "prefill"];

/// Keyword sets in priority order. Keywords are lower-case.
const KEYWORDS: [(CanonicalField, &[&str]); 6] = [
    (CanonicalField::CompanyName, &["ty", "company"]),
    (CanonicalField::RepresentativeName, &["tên", "name", "đại diện"]),
    (CanonicalField::Position, &["vụ", "position", "pos"]),
    (CanonicalField::Email, &["@", "mail"]),
    (CanonicalField::PhoneNumber, &["số", "phone", "tel"]),
    (CanonicalField::WorkerCount, &["lượng", "công nhân", "worker"]),
];

/// Result of parsing a prefilled link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLink {
    /// Form mapping built from matched identifiers; unmatched fields are empty.
    pub mapping: FieldMapping,

    /// The derived submission URL.
    pub form_url: String,

    /// Identifiers whose sample value matched no keyword set.
    pub unassigned: Vec<String>,
}

/// Classify a sample value. The first matching keyword set wins.
pub fn classify_sample(sample: &str) -> Option<CanonicalField> {
    let sample = sample.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| sample.contains(w)))
        .map(|(field, _)| *field)
}

/// Parse a prefilled form link into a form mapping and submission URL.
pub fn parse_prefilled_link(link: &str) -> Result<ParsedLink, LinkParseError> {
    let link = link.trim();
    if link.is_empty() {
        return Err(LinkParseError::Empty);
    }
    if link.contains("spreadsheets") {
        return Err(LinkParseError::SpreadsheetLink);
    }

    let url = Url::parse(link)?;

    let mut mapping = FieldMapping::empty();
    let mut unassigned = Vec::new();

    for (name, sample) in url.query_pairs() {
        if !name.starts_with(ENTRY_PREFIX) {
            continue;
        }
        match classify_sample(&sample) {
            Some(field) => {
                debug!(entry = %name, sample = %sample, field = %field, "matched form entry");
                mapping.set(field, name.into_owned());
            }
            None => {
                debug!(entry = %name, sample = %sample, "form entry left unassigned");
                unassigned.push(name.into_owned());
            }
        }
    }

    Ok(ParsedLink {
        mapping,
        form_url: derive_form_url(link),
        unassigned,
    })
}

/// Strip the query string and point the link at the response endpoint.
fn derive_form_url(link: &str) -> String {
    let base = link.split('?').next().unwrap_or(link);
    for suffix in LINK_SUFFIXES {
        if let Some(stem) = base.strip_suffix(suffix) {
            return format!("{}{}", stem, FORM_RESPONSE_SUFFIX);
        }
    }
    base.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_viewform_link() {
        let parsed = parse_prefilled_link(
            "https://docs.google.com/forms/d/e/FORM_ID/viewform?entry.111=congty&entry.222=email",
        )
        .unwrap();

        let expected = FieldMapping::empty()
            .with(CanonicalField::CompanyName, "entry.111")
            .with(CanonicalField::Email, "entry.222");
        assert_eq!(parsed.mapping, expected);
        assert_eq!(
            parsed.form_url,
            "https://docs.google.com/forms/d/e/FORM_ID/formResponse"
        );
        assert!(parsed.form_url.ends_with(FORM_RESPONSE_SUFFIX));
        assert!(parsed.unassigned.is_empty());
    }

    #[test]
    fn test_parse_full_vietnamese_link() {
        let link = "https://docs.google.com/forms/d/e/X/viewform?usp=pp_url\
                    &entry.1=c%C3%B4ng+ty&entry.2=t%C3%AAn&entry.3=ch%E1%BB%A9c+v%E1%BB%A5\
                    &entry.4=mail&entry.5=s%E1%BB%91+%C4%91i%E1%BB%87n+tho%E1%BA%A1i\
                    &entry.6=worker";
        let parsed = parse_prefilled_link(link).unwrap();

        assert_eq!(parsed.mapping.get(CanonicalField::CompanyName), "entry.1");
        assert_eq!(parsed.mapping.get(CanonicalField::RepresentativeName), "entry.2");
        assert_eq!(parsed.mapping.get(CanonicalField::Position), "entry.3");
        assert_eq!(parsed.mapping.get(CanonicalField::Email), "entry.4");
        assert_eq!(parsed.mapping.get(CanonicalField::PhoneNumber), "entry.5");
        assert_eq!(parsed.mapping.get(CanonicalField::WorkerCount), "entry.6");
    }

    #[test]
    fn test_priority_order() {
        // "company name" matches both company and name; company comes first.
        assert_eq!(classify_sample("Company Name"), Some(CanonicalField::CompanyName));
        // "position" contains "pos" and nothing earlier.
        assert_eq!(classify_sample("POSITION"), Some(CanonicalField::Position));
        assert_eq!(classify_sample("Telephone"), Some(CanonicalField::PhoneNumber));
        assert_eq!(classify_sample("xyz"), None);
    }

    #[test]
    fn test_unmatched_entries_left_unassigned() {
        let parsed = parse_prefilled_link(
            "https://docs.google.com/forms/d/e/X/viewform?entry.9=xyz&usp=pp_url&entry.8=mail",
        )
        .unwrap();
        assert_eq!(parsed.unassigned, vec!["entry.9".to_string()]);
        assert_eq!(parsed.mapping.get(CanonicalField::Email), "entry.8");
        assert_eq!(parsed.mapping.get(CanonicalField::CompanyName), "");
    }

    #[test]
    fn test_later_entry_wins_same_field() {
        let parsed = parse_prefilled_link(
            "https://docs.google.com/forms/d/e/X/viewform?entry.1=email&entry.2=mail",
        )
        .unwrap();
        assert_eq!(parsed.mapping.get(CanonicalField::Email), "entry.2");
    }

    #[test]
    fn test_prefill_suffix_rewritten() {
        let parsed =
            parse_prefilled_link("https://docs.google.com/forms/d/X/prefill?entry.1=congty").unwrap();
        assert_eq!(parsed.form_url, "https://docs.google.com/forms/d/X/formResponse");
    }

    #[test]
    fn test_other_suffix_kept() {
        let parsed =
            parse_prefilled_link("https://forms.example.com/f/X/edit?entry.1=congty").unwrap();
        assert_eq!(parsed.form_url, "https://forms.example.com/f/X/edit");
    }

    #[test]
    fn test_rejects_spreadsheet_link() {
        let err = parse_prefilled_link("https://docs.google.com/spreadsheets/d/abc/edit").unwrap_err();
        assert!(matches!(err, LinkParseError::SpreadsheetLink));
    }

    #[test]
    fn test_rejects_invalid_and_empty() {
        assert!(matches!(parse_prefilled_link("  "), Err(LinkParseError::Empty)));
        assert!(matches!(
            parse_prefilled_link("not a link"),
            Err(LinkParseError::InvalidUrl(_))
        ));
    }
}
