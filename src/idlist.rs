//! Identifier and grade list parsing, plus the identifier normalization rules the
//! detector and roster index share.
//!
//! List format, one entry per line (CRLF or LF):
//! - an all-digit line of at least `min_digits` characters is an identifier;
//! - in grade mode the line is `id,grade`, split on the first comma, and the grade
//!   may itself contain commas;
//! - any other non-blank line is a title and opens the next numbered section;
//! - a blank line ends the current section, so following ids are sectionless.
use crate::error::MarkError;
use crate::grid::CellValue;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    Identifiers,
    Grades,
}

impl ListMode {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "ids" | "identifiers" | "attendance" => Some(Self::Identifiers),
            "grades" | "grade" => Some(Self::Grades),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ListEntry {
    Title {
        text: String,
        section: usize,
    },
    #[serde(rename_all = "camelCase")]
    Id {
        id: String,
        section: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        grade: Option<String>,
        line: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIdentifierList {
    pub entries: Vec<ListEntry>,
    pub target_ids: BTreeSet<String>,
    pub id_counts: BTreeMap<String, usize>,
    pub section_id_counts: BTreeMap<usize, BTreeMap<String, usize>>,
}

impl ParsedIdentifierList {
    /// Identifier entries in input order as `(id, section, grade)`.
    pub fn id_entries(&self) -> impl Iterator<Item = (&str, Option<usize>, Option<&str>)> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            ListEntry::Id {
                id, section, grade, ..
            } => Some((id.as_str(), *section, grade.as_deref())),
            ListEntry::Title { .. } => None,
        })
    }

    pub fn count_of(&self, id: &str) -> usize {
        self.id_counts.get(id).copied().unwrap_or(0)
    }

    pub fn duplicates(&self) -> Vec<(&str, usize)> {
        self.id_counts
            .iter()
            .filter(|(_, &n)| n > 1)
            .map(|(id, &n)| (id.as_str(), n))
            .collect()
    }
}

struct ScanState {
    current_section: Option<usize>,
    titles_seen: usize,
    list: ParsedIdentifierList,
}

impl ScanState {
    fn open_title(mut self, text: &str) -> Self {
        self.titles_seen += 1;
        self.current_section = Some(self.titles_seen);
        self.list.entries.push(ListEntry::Title {
            text: text.to_string(),
            section: self.titles_seen,
        });
        self
    }

    fn push_id(mut self, id: &str, grade: Option<String>, line: usize) -> Self {
        let section = self.current_section;
        self.list.target_ids.insert(id.to_string());
        *self.list.id_counts.entry(id.to_string()).or_default() += 1;
        if let Some(section) = section {
            *self
                .list
                .section_id_counts
                .entry(section)
                .or_default()
                .entry(id.to_string())
                .or_default() += 1;
        }
        self.list.entries.push(ListEntry::Id {
            id: id.to_string(),
            section,
            grade,
            line,
        });
        self
    }
}

pub fn parse_identifier_list(
    text: &str,
    mode: ListMode,
    min_digits: usize,
) -> Result<ParsedIdentifierList, MarkError> {
    let initial = ScanState {
        current_section: None,
        titles_seen: 0,
        list: ParsedIdentifierList::default(),
    };
    let state = text
        .lines()
        .enumerate()
        .try_fold(initial, |mut state, (idx, raw)| {
            let line_no = idx + 1;
            let t = raw.trim();
            if t.is_empty() {
                state.current_section = None;
                return Ok(state);
            }
            match mode {
                ListMode::Identifiers => {
                    if is_id_text(t, min_digits) {
                        Ok(state.push_id(t, None, line_no))
                    } else {
                        Ok(state.open_title(t))
                    }
                }
                ListMode::Grades => match t.split_once(',') {
                    Some((left, right)) => {
                        let left = left.trim();
                        let right = right.trim();
                        if !is_id_text(left, min_digits) {
                            Ok(state.open_title(t))
                        } else if right.is_empty() {
                            Err(MarkError::MissingGrade {
                                line: line_no,
                                id: left.to_string(),
                            })
                        } else {
                            Ok(state.push_id(left, Some(right.to_string()), line_no))
                        }
                    }
                    None if is_id_text(t, min_digits) => Err(MarkError::MissingGrade {
                        line: line_no,
                        id: t.to_string(),
                    }),
                    None => Ok(state.open_title(t)),
                },
            }
        })?;

    if state.list.target_ids.is_empty() {
        return Err(MarkError::EmptyInput);
    }
    log::debug!(
        "parsed {} identifier entries ({} distinct, {} sections)",
        state.list.id_entries().count(),
        state.list.target_ids.len(),
        state.titles_seen
    );
    Ok(state.list)
}

/// All ASCII digits and at least `min_digits` long.
pub fn is_id_text(s: &str, min_digits: usize) -> bool {
    s.len() >= min_digits && s.bytes().all(|b| b.is_ascii_digit())
}

/// Trims, drops one trailing `.0`, and truncates numbers to integers.
pub fn normalize_id(value: &CellValue) -> Option<String> {
    match value {
        CellValue::Number(v) if v.is_finite() => Some((v.trunc() as i64).to_string()),
        CellValue::Text(s) => normalize_id_text(s),
        _ => None,
    }
}

pub fn normalize_id_text(s: &str) -> Option<String> {
    let t = s.trim();
    let t = t.strip_suffix(".0").unwrap_or(t).trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^@\s]+)@[^@\s]+$").expect("Hardcode regex pattern"))
}

/// The part before `@` when the text is email-shaped.
pub fn email_username(s: &str) -> Option<&str> {
    email_pattern()
        .captures(s.trim())
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// A bare identifier, or an email whose username is one.
pub fn is_id_shaped(value: &CellValue, min_digits: usize) -> bool {
    let Some(norm) = normalize_id(value) else {
        return false;
    };
    is_id_text(&norm, min_digits)
        || email_username(&norm)
            .map(|user| is_id_text(user, min_digits))
            .unwrap_or(false)
}

/// Pulls an identifier out of a cell.
///
/// With a target set only members count, matched directly or through an email
/// username. Without one, anything id-shaped counts.
pub fn extract_id(
    value: &CellValue,
    targets: Option<&BTreeSet<String>>,
    min_digits: usize,
) -> Option<String> {
    let norm = normalize_id(value)?;
    match targets {
        Some(targets) => {
            if targets.contains(&norm) {
                return Some(norm);
            }
            email_username(&norm)
                .and_then(normalize_id_text)
                .filter(|user| targets.contains(user))
        }
        None => {
            if is_id_text(&norm, min_digits) {
                return Some(norm);
            }
            email_username(&norm)
                .filter(|user| is_id_text(user, min_digits))
                .map(str::to_string)
        }
    }
}
