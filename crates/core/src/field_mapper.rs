//! Header -> canonical field inference for delimited uploads.
//!
//! The mapper only proposes. Whatever mapping the caller sends back at
//! preview time is applied verbatim.

use serde::{Deserialize, Serialize};

use crate::contact::{deserialize_optional_field, CanonicalField, ContactFields};
use crate::formats::RawRecord;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One `(source_field, canonical_field)` pair. `canonical_field = None`
/// means the source column is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMappingEntry {
    pub source_field: String,
    #[serde(default, deserialize_with = "deserialize_optional_field")]
    pub canonical_field: Option<CanonicalField>,
}

impl FieldMappingEntry {
    pub fn new(source_field: impl Into<String>, canonical_field: Option<CanonicalField>) -> Self {
        Self {
            source_field: source_field.into(),
            canonical_field,
        }
    }
}

// ---------------------------------------------------------------------------
// Synonym table
// ---------------------------------------------------------------------------

/// Known spellings per canonical field, in canonical priority order.
/// Compared after [`normalize_header`], so case and punctuation are free.
pub const FIELD_SYNONYMS: &[(CanonicalField, &[&str])] = &[
    (
        CanonicalField::Firstname,
        &["first name", "firstname", "given name", "forename", "first"],
    ),
    (
        CanonicalField::Lastname,
        &["last name", "lastname", "surname", "family name", "last"],
    ),
    (CanonicalField::Nickname, &["nickname", "nick", "alias"]),
    (CanonicalField::Gender, &["gender", "sex"]),
    (
        CanonicalField::Email,
        &["email", "e-mail", "email address", "mail"],
    ),
    (
        CanonicalField::Phone,
        &["phone", "phone number", "telephone", "tel", "mobile", "cell"],
    ),
    (
        CanonicalField::Birthday,
        &["birthday", "birth date", "date of birth", "dob", "birthdate"],
    ),
    (
        CanonicalField::Address,
        &["address", "street address", "home address", "location"],
    ),
    (CanonicalField::HowWeMet, &["how we met", "how met", "met"]),
    (
        CanonicalField::FoodPreference,
        &["food preference", "food preferences", "diet", "dietary preference"],
    ),
    (
        CanonicalField::WorkInformation,
        &[
            "work information",
            "work",
            "company",
            "organization",
            "organisation",
            "employer",
            "job title",
        ],
    ),
    (
        CanonicalField::ContactInformation,
        &["contact information", "contact info", "other contact"],
    ),
    (
        CanonicalField::Circles,
        &["circles", "circle", "groups", "group", "tags", "categories"],
    ),
];

// ---------------------------------------------------------------------------
// Inference
// ---------------------------------------------------------------------------

/// Lowercase and drop everything that is not a letter or digit.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Best canonical field for a single header, if any.
///
/// An exact synonym match wins; otherwise the first canonical field (in
/// priority order) whose normalized name is contained in the header.
pub fn match_header(header: &str) -> Option<CanonicalField> {
    let normalized = normalize_header(header);
    if normalized.is_empty() {
        return None;
    }

    let exact = FIELD_SYNONYMS.iter().find_map(|(field, synonyms)| {
        synonyms
            .iter()
            .any(|s| normalize_header(s) == normalized)
            .then_some(*field)
    });
    if exact.is_some() {
        return exact;
    }

    CanonicalField::ALL
        .iter()
        .find(|field| normalized.contains(&normalize_header(field.as_str())))
        .copied()
}

/// Propose a mapping for every header, in header order.
///
/// Each canonical field is claimed by at most one header: when a later
/// header would map to a field an earlier one already took, it is left
/// unmapped.
pub fn suggest_mapping(headers: &[String]) -> Vec<FieldMappingEntry> {
    let mut claimed: Vec<CanonicalField> = Vec::new();
    headers
        .iter()
        .map(|header| {
            let field = match_header(header).filter(|f| !claimed.contains(f));
            if let Some(f) = field {
                claimed.push(f);
            }
            FieldMappingEntry::new(header.clone(), field)
        })
        .collect()
}

/// `true` if at least one source field maps to a canonical field.
pub fn has_mapped_field(mapping: &[FieldMappingEntry]) -> bool {
    mapping.iter().any(|e| e.canonical_field.is_some())
}

/// First mapped entry whose source field is not one of `headers`.
pub fn unknown_source_field<'a>(
    mapping: &'a [FieldMappingEntry],
    headers: &[String],
) -> Option<&'a str> {
    mapping
        .iter()
        .filter(|e| e.canonical_field.is_some())
        .map(|e| e.source_field.as_str())
        .find(|source| !headers.iter().any(|h| h == source))
}

/// Project one raw row through a mapping.
///
/// Values are trimmed and empty values dropped. When several source fields
/// target the same canonical field, the first non-empty one in mapping
/// order wins.
pub fn apply_mapping(record: &RawRecord, mapping: &[FieldMappingEntry]) -> ContactFields {
    let mut fields = ContactFields::new();
    for entry in mapping {
        let Some(field) = entry.canonical_field else {
            continue;
        };
        if fields.contains_key(&field) {
            continue;
        }
        if let Some(value) = record.get(&entry.source_field).map(|v| v.trim()) {
            if !value.is_empty() {
                fields.insert(field, value.to_string());
            }
        }
    }
    fields
}

/// Read a record whose keys already are canonical field names (vCard path).
/// Unknown keys are ignored.
pub fn canonical_record_fields(record: &RawRecord) -> ContactFields {
    record
        .iter()
        .filter_map(|(key, value)| {
            let field: CanonicalField = key.parse().ok()?;
            let value = value.trim();
            (!value.is_empty()).then(|| (field, value.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
