//! Canonical contact schema shared by every stage of the import pipeline.
//!
//! The set of importable fields is fixed. Declaration order of
//! [`CanonicalField`] doubles as the mapper's tie-break priority and as the
//! serialization order of [`ContactFields`].

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UnknownNameError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Separator for multi-valued fields inside a single delimited cell.
pub const CIRCLE_SEPARATOR: char = ';';

// ---------------------------------------------------------------------------
// Canonical fields
// ---------------------------------------------------------------------------

/// A field of the contact schema that imported data can be mapped onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Firstname,
    Lastname,
    Nickname,
    Gender,
    Email,
    Phone,
    Birthday,
    Address,
    HowWeMet,
    FoodPreference,
    WorkInformation,
    ContactInformation,
    Circles,
}

impl CanonicalField {
    /// Every canonical field, in priority order.
    pub const ALL: &'static [CanonicalField] = &[
        Self::Firstname,
        Self::Lastname,
        Self::Nickname,
        Self::Gender,
        Self::Email,
        Self::Phone,
        Self::Birthday,
        Self::Address,
        Self::HowWeMet,
        Self::FoodPreference,
        Self::WorkInformation,
        Self::ContactInformation,
        Self::Circles,
    ];

    /// Stable string form matching serde's `rename_all = "snake_case"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firstname => "firstname",
            Self::Lastname => "lastname",
            Self::Nickname => "nickname",
            Self::Gender => "gender",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Birthday => "birthday",
            Self::Address => "address",
            Self::HowWeMet => "how_we_met",
            Self::FoodPreference => "food_preference",
            Self::WorkInformation => "work_information",
            Self::ContactInformation => "contact_information",
            Self::Circles => "circles",
        }
    }

    /// `circles` holds several values joined with [`CIRCLE_SEPARATOR`].
    pub fn is_multi_valued(&self) -> bool {
        matches!(self, Self::Circles)
    }

    /// A row cannot be committed without this field.
    pub fn is_required(&self) -> bool {
        matches!(self, Self::Firstname)
    }
}

impl FromStr for CanonicalField {
    type Err = UnknownNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| UnknownNameError {
                kind: "contact field",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor returned to mapping UIs.
#[derive(Debug, Clone, Serialize)]
pub struct CanonicalFieldInfo {
    pub name: CanonicalField,
    pub multi_valued: bool,
    pub required: bool,
}

/// All canonical fields with their flags, in priority order.
pub fn canonical_field_info() -> Vec<CanonicalFieldInfo> {
    CanonicalField::ALL
        .iter()
        .map(|f| CanonicalFieldInfo {
            name: *f,
            multi_valued: f.is_multi_valued(),
            required: f.is_required(),
        })
        .collect()
}

/// Deserialize an optional canonical field where `""` and `null` both mean
/// "ignore this source field".
pub fn deserialize_optional_field<'de, D>(deserializer: D) -> Result<Option<CanonicalField>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => name.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Canonical field -> value for one imported row. Ordered by field priority.
pub type ContactFields = BTreeMap<CanonicalField, String>;

/// Split a multi-valued cell into trimmed, de-duplicated, non-empty values.
pub fn split_circles(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(CIRCLE_SEPARATOR).map(str::trim) {
        if !part.is_empty() && !out.iter().any(|c| c == part) {
            out.push(part.to_string());
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Contact records
// ---------------------------------------------------------------------------

/// A contact as held by the contact store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: DbId,
    pub firstname: String,
    pub lastname: String,
    pub nickname: String,
    pub gender: String,
    pub email: String,
    pub phone: String,
    pub birthday: Option<NaiveDate>,
    pub address: String,
    pub how_we_met: String,
    pub food_preference: String,
    pub work_information: String,
    pub contact_information: String,
    pub circles: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Field values to write to the contact store.
///
/// `None` means "not supplied": `create` fills the canonical default,
/// `update` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactDraft {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub nickname: Option<String>,
    pub gender: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub address: Option<String>,
    pub how_we_met: Option<String>,
    pub food_preference: Option<String>,
    pub work_information: Option<String>,
    pub contact_information: Option<String>,
    pub circles: Option<Vec<String>>,
}

impl ContactDraft {
    /// Build a draft from resolved row fields. Empty values are treated as
    /// absent so they can never blank out stored data.
    ///
    /// `birthday` must already be normalized to `YYYY-MM-DD`; anything else
    /// is dropped.
    pub fn from_fields(fields: &ContactFields) -> Self {
        let mut draft = Self::default();
        for (field, value) in fields {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let text = Some(value.to_string());
            match field {
                CanonicalField::Firstname => draft.firstname = text,
                CanonicalField::Lastname => draft.lastname = text,
                CanonicalField::Nickname => draft.nickname = text,
                CanonicalField::Gender => draft.gender = text,
                CanonicalField::Email => draft.email = text,
                CanonicalField::Phone => draft.phone = text,
                CanonicalField::Birthday => {
                    draft.birthday = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok();
                }
                CanonicalField::Address => draft.address = text,
                CanonicalField::HowWeMet => draft.how_we_met = text,
                CanonicalField::FoodPreference => draft.food_preference = text,
                CanonicalField::WorkInformation => draft.work_information = text,
                CanonicalField::ContactInformation => draft.contact_information = text,
                CanonicalField::Circles => {
                    let circles = split_circles(value);
                    if !circles.is_empty() {
                        draft.circles = Some(circles);
                    }
                }
            }
        }
        draft
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
