//! Extraction instructions and structured-output schema.

use serde_json::{Value, json};

use super::LanguageMode;
use crate::models::record::CanonicalField;

/// Fields the service is asked to always return.
///
/// `position` may be omitted by the service; the record defaults it to empty.
pub const REQUIRED_FIELDS: [CanonicalField; 4] = [
    CanonicalField::CompanyName,
    CanonicalField::RepresentativeName,
    CanonicalField::Email,
    CanonicalField::PhoneNumber,
];

fn language_rules(language: LanguageMode) -> &'static str {
    match language {
        LanguageMode::Korean => {
            "The page is a bilingual business directory (Korean and Latin script).\n\
             CURRENT MODE: KOREAN.\n\
             Mandatory rules:\n\
             1. Representative name and position: extract ONLY the Korean (Hangul) text and \
             ignore the accompanying Latin text. For \"Hong Gil Dong (홍길동)\" return \"홍길동\"; \
             for \"Giám đốc / 사장\" return \"사장\".\n\
             2. Company name: ALWAYS return the Latin (Vietnamese or English) name. Use the \
             Hangul name only if no Latin name exists.\n\
             Korean labels that locate each value:\n\
             - company name: '상호', '회사명'\n\
             - representative: '대표', 'CEO'\n\
             - position: '직위'\n\
             - phone number: '전화', 'Tel'\n\
             - worker count: '종업원 수'"
        }
        LanguageMode::Latin => {
            "The page is a bilingual business directory (Korean and Latin script).\n\
             CURRENT MODE: LATIN (Vietnamese/English).\n\
             Mandatory rules:\n\
             1. Representative name and position: extract ONLY the Latin-script text and \
             ignore the accompanying Korean (Hangul) text. For \"Hong Gil Dong (홍길동)\" return \
             \"Hong Gil Dong\"; for \"Giám đốc / 사장\" return \"Giám đốc\".\n\
             2. Company name: prefer the Vietnamese or English name."
        }
    }
}

/// Build the instruction text sent alongside the image.
pub fn build_prompt(language: LanguageMode) -> String {
    format!(
        "Analyze this image of a business directory page.\n\
         {rules}\n\n\
         Extract the following fields exactly:\n\
         1. Company name -> key: companyName\n\
         2. Representative / person in charge -> key: representativeName\n\
         3. Position -> key: position\n\
         4. Email -> key: email\n\
         5. Phone number -> key: phoneNumber\n\
         6. Worker / employee count (keep ranges as written) -> key: workerCount\n\n\
         If a value cannot be found, use an empty string \"\".",
        rules = language_rules(language)
    )
}

/// JSON schema constraining the service's structured output.
pub fn response_schema() -> Value {
    let properties: serde_json::Map<String, Value> = CanonicalField::ALL
        .iter()
        .map(|f| (f.key().to_string(), json!({ "type": "STRING" })))
        .collect();
    let required: Vec<&str> = REQUIRED_FIELDS.iter().map(|f| f.key()).collect();

    json!({
        "type": "OBJECT",
        "properties": properties,
        "required": required,
    })
}
