//! vCard decoder (versions 2.1, 3.0 and 4.0).
//!
//! vCard properties are already semantically typed, so this decoder emits
//! records keyed by canonical contact field name and the delimited-path
//! field mapper is never involved.
//!
//! Properties that may repeat (two `TEL` lines, say) are collapsed to a
//! single value according to a [`MultiValuePolicy`]. This is a known
//! simplification: the other values are dropped. `CATEGORIES` is the
//! exception; all occurrences are merged into `circles`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{decode_text, RawRecord};
use crate::contact::{CanonicalField, CIRCLE_SEPARATOR};
use crate::error::{ImportError, UnknownNameError};

/// How repeated single-valued properties are collapsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiValuePolicy {
    /// The first occurrence in the entry wins.
    #[default]
    FirstWins,
    /// The occurrence with the lowest `PREF` value wins (`TYPE=pref`
    /// counts as `PREF=1`); otherwise the first occurrence.
    PreferredThenFirst,
}

/// Accepts `first` or `preferred`, case-insensitively.
impl FromStr for MultiValuePolicy {
    type Err = UnknownNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first_wins" => Ok(Self::FirstWins),
            "preferred" | "preferred_then_first" => Ok(Self::PreferredThenFirst),
            _ => Err(UnknownNameError {
                kind: "multi-value policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Output of [`parse_vcards`].
#[derive(Debug, Clone, Default)]
pub struct VcardDocument {
    /// One record per well-formed entry, in file order.
    pub records: Vec<RawRecord>,
    /// Entries dropped because they were malformed.
    pub skipped_entries: usize,
    /// Human-readable reason for each dropped entry.
    pub warnings: Vec<String>,
}

/// Decode every vCard entry in `bytes`.
///
/// A file without any `BEGIN:VCARD` ... `END:VCARD` structure is
/// [`ImportError::UnreadableFile`]. Individual malformed entries (missing
/// `END`, a content line without a value separator) are skipped and
/// reported through [`VcardDocument::skipped_entries`].
pub fn parse_vcards(
    bytes: &[u8],
    policy: MultiValuePolicy,
    max_rows: Option<usize>,
) -> Result<VcardDocument, ImportError> {
    let text = decode_text(bytes)?;

    let mut doc = VcardDocument::default();
    let mut saw_begin = false;
    let mut saw_end = false;
    let mut entry_no = 0usize;
    let mut current: Option<PendingEntry> = None;

    for line in unfold(text) {
        if line.trim().is_empty() {
            continue;
        }

        if line.trim().eq_ignore_ascii_case("BEGIN:VCARD") {
            saw_begin = true;
            entry_no += 1;
            if current.take().is_some() {
                skip_entry(&mut doc, entry_no - 1, "missing END:VCARD");
            }
            current = Some(PendingEntry::default());
            continue;
        }

        if line.trim().eq_ignore_ascii_case("END:VCARD") {
            saw_end = true;
            match current.take() {
                Some(entry) if entry.malformed.is_some() => {
                    let reason = entry.malformed.unwrap_or_default();
                    skip_entry(&mut doc, entry_no, &reason);
                }
                Some(entry) => {
                    if let Some(limit) = max_rows {
                        if doc.records.len() >= limit {
                            return Err(ImportError::RowLimitExceeded {
                                rows: doc.records.len() + 1,
                                limit,
                            });
                        }
                    }
                    doc.records.push(entry.into_record(policy));
                }
                None => {
                    tracing::debug!("Ignoring END:VCARD without matching BEGIN");
                }
            }
            continue;
        }

        let Some(entry) = current.as_mut() else {
            continue;
        };
        if entry.malformed.is_some() {
            continue;
        }
        match ContentLine::parse(&line) {
            Some(prop) => entry.props.push(prop),
            None => entry.malformed = Some(format!("unparseable line '{}'", truncate(&line, 40))),
        }
    }

    if current.is_some() {
        skip_entry(&mut doc, entry_no, "missing END:VCARD");
    }

    if !saw_begin || !saw_end {
        return Err(ImportError::UnreadableFile(
            "no BEGIN:VCARD/END:VCARD entry found".to_string(),
        ));
    }

    Ok(doc)
}

fn skip_entry(doc: &mut VcardDocument, entry_no: usize, reason: &str) {
    tracing::warn!(entry = entry_no, reason, "Skipping malformed vCard entry");
    doc.skipped_entries += 1;
    doc.warnings.push(format!("vCard entry {entry_no} skipped: {reason}"));
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

// ---------------------------------------------------------------------------
// Line handling
// ---------------------------------------------------------------------------

/// Join folded lines (continuations start with a space or tab) and
/// quoted-printable soft line breaks (a trailing `=`).
fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(last) = lines.last_mut() {
            if raw.starts_with(' ') || raw.starts_with('\t') {
                last.push_str(&raw[1..]);
                continue;
            }
            if is_quoted_printable_line(last) && last.ends_with('=') {
                last.pop();
                last.push_str(raw);
                continue;
            }
        }
        lines.push(raw.to_string());
    }
    lines
}

fn is_quoted_printable_line(line: &str) -> bool {
    line.split(':')
        .next()
        .is_some_and(|head| head.to_uppercase().contains("QUOTED-PRINTABLE"))
}

/// One `group.NAME;PARAM=...:value` line.
#[derive(Debug, Clone)]
struct ContentLine {
    /// Upper-cased property name without group prefix.
    name: String,
    /// Upper-cased parameter keys with their raw values. Bare vCard 2.1
    /// parameters (`TEL;HOME:`) are stored under `TYPE`.
    params: Vec<(String, String)>,
    /// Raw value, still escaped; quoted-printable already decoded.
    value: String,
}

impl ContentLine {
    fn parse(line: &str) -> Option<Self> {
        let colon = find_value_separator(line)?;
        let (head, value) = (&line[..colon], &line[colon + 1..]);

        let mut parts = head.split(';');
        let full_name = parts.next()?.trim();
        let name = full_name.rsplit('.').next().unwrap_or(full_name).to_uppercase();
        if name.is_empty() {
            return None;
        }

        let params: Vec<(String, String)> = parts
            .filter(|p| !p.trim().is_empty())
            .map(|p| match p.split_once('=') {
                Some((k, v)) => (k.trim().to_uppercase(), v.trim().trim_matches('"').to_string()),
                None => ("TYPE".to_string(), p.trim().to_string()),
            })
            .collect();

        let quoted_printable = params.iter().any(|(k, v)| {
            (k == "ENCODING" || k == "TYPE") && v.eq_ignore_ascii_case("QUOTED-PRINTABLE")
        });
        let value = if quoted_printable {
            decode_quoted_printable(value)
        } else {
            value.to_string()
        };

        Some(Self {
            name,
            params,
            value,
        })
    }

    /// Preference rank, lower is more preferred. `TYPE=pref` ranks as 1,
    /// `PREF=n` as n. `None` when the occurrence is not marked.
    fn preference(&self) -> Option<u8> {
        self.params
            .iter()
            .filter_map(|(k, v)| match k.as_str() {
                "PREF" => v.trim().parse::<u8>().ok(),
                "TYPE" => v
                    .split(',')
                    .any(|t| t.trim().eq_ignore_ascii_case("pref"))
                    .then_some(1),
                _ => None,
            })
            .min()
    }
}

/// Index of the first `:` that is not inside a quoted parameter value.
fn find_value_separator(line: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

fn decode_quoted_printable(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' {
            let hex = value.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok());
            if let Some(b) = hex {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Split on an unescaped separator and unescape each component.
///
/// `\n`/`\N` become a line break; any other escaped character is taken
/// literally. With `sep = None` the value is only unescaped.
fn split_unescaped(value: &str, sep: Option<char>) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') | Some('N') => current.push('\n'),
                Some(other) => current.push(other),
                None => {}
            },
            c if Some(c) == sep => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

fn unescape(value: &str) -> String {
    split_unescaped(value, None).remove(0).trim().to_string()
}

fn components(value: &str) -> Vec<String> {
    split_unescaped(value, Some(';'))
        .into_iter()
        .map(|c| c.trim().to_string())
        .collect()
}

// ---------------------------------------------------------------------------
// Entry -> record
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PendingEntry {
    props: Vec<ContentLine>,
    malformed: Option<String>,
}

impl PendingEntry {
    /// Pick the occurrence of `name` the policy selects.
    fn pick(&self, name: &str, policy: MultiValuePolicy) -> Option<&ContentLine> {
        let mut matching = self.props.iter().filter(|p| p.name == name && !p.value.trim().is_empty());
        match policy {
            MultiValuePolicy::FirstWins => matching.next(),
            MultiValuePolicy::PreferredThenFirst => {
                let all: Vec<&ContentLine> = matching.collect();
                all.iter()
                    .filter_map(|p| p.preference().map(|rank| (rank, *p)))
                    .min_by_key(|(rank, _)| *rank)
                    .map(|(_, p)| p)
                    .or_else(|| all.first().copied())
            }
        }
    }

    fn into_record(self, policy: MultiValuePolicy) -> RawRecord {
        let mut firstname = String::new();
        let mut lastname = String::new();
        if let Some(n) = self.pick("N", policy) {
            let parts = components(&n.value);
            lastname = parts.first().cloned().unwrap_or_default();
            firstname = parts.get(1).cloned().unwrap_or_default();
        }
        if firstname.is_empty() || lastname.is_empty() {
            if let Some(fn_prop) = self.pick("FN", policy) {
                let full = unescape(&fn_prop.value);
                let mut words = full.splitn(2, char::is_whitespace);
                let first = words.next().unwrap_or_default().trim().to_string();
                let rest = words.next().unwrap_or_default().trim().to_string();
                if firstname.is_empty() {
                    firstname = first;
                }
                if lastname.is_empty() {
                    lastname = rest;
                }
            }
        }

        let text = |name: &str| self.pick(name, policy).map(|p| unescape(&p.value)).unwrap_or_default();

        let nickname = text("NICKNAME");
        let gender = self
            .pick("GENDER", policy)
            .map(|p| expand_gender(&p.value))
            .unwrap_or_default();
        let email = text("EMAIL");
        let phone = {
            let raw = text("TEL");
            raw.strip_prefix("tel:").map(str::to_string).unwrap_or(raw)
        };
        let birthday = self
            .pick("BDAY", policy)
            .map(|p| normalize_bday(&unescape(&p.value)))
            .unwrap_or_default();
        let address = self
            .pick("ADR", policy)
            .map(|p| {
                components(&p.value)
                    .into_iter()
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let org = self
            .pick("ORG", policy)
            .map(|p| {
                components(&p.value)
                    .into_iter()
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        let title = text("TITLE");
        let work = match (title.is_empty(), org.is_empty()) {
            (false, false) => format!("{title}, {org}"),
            (false, true) => title,
            (true, false) => org,
            (true, true) => String::new(),
        };

        let mut circles: Vec<String> = Vec::new();
        for prop in self.props.iter().filter(|p| p.name == "CATEGORIES") {
            for c in split_unescaped(&prop.value, Some(',')) {
                let c = c.trim().to_string();
                if !c.is_empty() && !circles.contains(&c) {
                    circles.push(c);
                }
            }
        }
        let circles = circles.join(&CIRCLE_SEPARATOR.to_string());

        let values = [
            (CanonicalField::Firstname, firstname),
            (CanonicalField::Lastname, lastname),
            (CanonicalField::Nickname, nickname),
            (CanonicalField::Gender, gender),
            (CanonicalField::Email, email),
            (CanonicalField::Phone, phone),
            (CanonicalField::Birthday, birthday),
            (CanonicalField::Address, address),
            (CanonicalField::WorkInformation, work),
            (CanonicalField::Circles, circles),
        ];
        values
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(f, v)| (f.as_str().to_string(), v))
            .collect()
    }
}

/// vCard 4 `GENDER` is `sex;identity`. Expand the sex letter, falling back
/// to the free-text identity.
fn expand_gender(value: &str) -> String {
    let parts = components(value);
    let sex = parts.first().map(String::as_str).unwrap_or_default();
    let expanded = match sex.to_uppercase().as_str() {
        "M" => "male",
        "F" => "female",
        "O" => "other",
        "N" => "none",
        "U" => "unknown",
        _ => sex,
    };
    if expanded.is_empty() {
        parts.get(1).cloned().unwrap_or_default()
    } else {
        expanded.to_string()
    }
}

/// `19900401` and `1990-04-01T00:00:00Z` become `1990-04-01`; anything else
/// is passed through for validation to judge.
fn normalize_bday(value: &str) -> String {
    let date = value.split('T').next().unwrap_or(value).trim();
    if date.len() == 8 && date.bytes().all(|b| b.is_ascii_digit()) {
        format!("{}-{}-{}", &date[..4], &date[4..6], &date[6..])
    } else {
        date.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
