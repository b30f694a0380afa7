//! Decoders that turn an uploaded file into ordered flat records.
//!
//! - [`delimited`] reads spreadsheet-style text with a header row.
//! - [`vcard`] reads concatenated vCard entries and keys its records by
//!   canonical contact field directly.

pub mod delimited;
pub mod vcard;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;

/// One parsed record: field name -> raw value, in source column order.
pub type RawRecord = IndexMap<String, String>;

/// File extensions treated as delimited text.
pub const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

/// File extensions treated as vCard.
pub const VCARD_EXTENSIONS: &[&str] = &["vcf", "vcard"];

/// MIME types treated as delimited text.
pub const DELIMITED_MIME_TYPES: &[&str] = &[
    "text/csv",
    "application/csv",
    "text/tab-separated-values",
    "text/plain",
];

/// MIME types treated as vCard.
pub const VCARD_MIME_TYPES: &[&str] = &["text/vcard", "text/x-vcard", "text/directory"];

/// Which decoder produced a session's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Delimited,
    Vcard,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delimited => "delimited",
            Self::Vcard => "vcard",
        }
    }

    /// Interpret a kind hint: `delimited`/`vcard`, a MIME type, a file name
    /// or a bare extension. Returns `None` if the hint names neither format.
    pub fn from_hint(hint: &str) -> Option<Self> {
        let hint = hint.trim().to_lowercase();
        match hint.as_str() {
            "delimited" | "csv" => return Some(Self::Delimited),
            "vcard" | "vcf" => return Some(Self::Vcard),
            _ => {}
        }

        let mime = hint.split(';').next().unwrap_or_default().trim();
        if DELIMITED_MIME_TYPES.contains(&mime) {
            return Some(Self::Delimited);
        }
        if VCARD_MIME_TYPES.contains(&mime) {
            return Some(Self::Vcard);
        }

        let ext = hint.rsplit('.').next().unwrap_or_default();
        if DELIMITED_EXTENSIONS.contains(&ext) {
            Some(Self::Delimited)
        } else if VCARD_EXTENSIONS.contains(&ext) {
            Some(Self::Vcard)
        } else {
            None
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide which decoder to run for an upload.
///
/// A hint that names a supported format wins. A hint that names something
/// else is rejected outright. Without a hint the content is sniffed: text
/// opening with `BEGIN:VCARD` is vCard, any other UTF-8 text is delimited.
pub fn detect_source_kind(hint: Option<&str>, bytes: &[u8]) -> Result<SourceKind, ImportError> {
    if let Some(hint) = hint.filter(|h| !h.trim().is_empty()) {
        return SourceKind::from_hint(hint).ok_or_else(|| {
            ImportError::UnsupportedFileType(format!(
                "'{hint}' is neither delimited text nor vCard"
            ))
        });
    }

    let text = std::str::from_utf8(strip_bom(bytes)).map_err(|_| {
        ImportError::UnsupportedFileType("content is not UTF-8 text".to_string())
    })?;

    let head = text.trim_start();
    if head
        .get(..11)
        .is_some_and(|p| p.eq_ignore_ascii_case("BEGIN:VCARD"))
    {
        Ok(SourceKind::Vcard)
    } else {
        Ok(SourceKind::Delimited)
    }
}

/// Decode bytes as UTF-8 text, dropping a leading byte-order mark.
pub(crate) fn decode_text(bytes: &[u8]) -> Result<&str, ImportError> {
    std::str::from_utf8(strip_bom(bytes))
        .map_err(|e| ImportError::UnreadableFile(format!("file is not valid UTF-8: {e}")))
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}
