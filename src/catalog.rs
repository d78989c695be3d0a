//! Column catalog: every addressable header in a scope, one entry per
//! `(kind, header text)`.
//!
//! Built in two phases. Phase one collects raw header sightings tagged by the
//! pass that saw them (row 1, or rows 2..=5 inside a detected area). Phase two
//! groups them and partitions purely by column-range membership, so a header
//! repeated under both the section and the lecture area ends up as two entries
//! that each keep only their own locations.
use crate::config::DetectionPolicy;
use crate::detect::{detect_roles, ColumnKind, SheetRoles};
use crate::error::MarkError;
use crate::grid::{cell_reference, Grid};
use crate::idlist::is_id_shaped;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogScope {
    AllSheets,
    Sheet(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLocation {
    pub sheet: String,
    pub header_row: u32,
    pub col: u32,
    pub cell: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnOption {
    pub key: String,
    pub header_text: String,
    pub kind: ColumnKind,
    pub occurrences: usize,
    pub locations: Vec<ColumnLocation>,
}

pub fn option_key(kind: ColumnKind, header_text: &str) -> String {
    format!("{}::{}", kind.as_str(), header_text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPass {
    TopRow,
    Area(ColumnKind),
}

#[derive(Debug, Clone)]
struct RawHeader {
    text: String,
    pass: ScanPass,
    location: ColumnLocation,
}

#[derive(Debug, Clone)]
struct Group {
    kind: ColumnKind,
    header_text: String,
    locations: Vec<ColumnLocation>,
}

/// Sheets named by `scope`, in workbook order.
pub fn resolve_scope<G: Grid + ?Sized>(
    grid: &G,
    scope: &CatalogScope,
) -> Result<Vec<String>, MarkError> {
    let names = grid.sheet_names();
    if names.is_empty() {
        return Err(MarkError::invalid_grid("workbook has no sheets"));
    }
    match scope {
        CatalogScope::AllSheets => Ok(names),
        CatalogScope::Sheet(name) => {
            if names.iter().any(|n| n == name) {
                Ok(vec![name.clone()])
            } else {
                Err(MarkError::invalid_grid(format!("sheet '{name}' not found")))
            }
        }
    }
}

pub fn build_catalog<G: Grid + ?Sized>(
    grid: &G,
    scope: &CatalogScope,
    policy: &DetectionPolicy,
) -> Result<Vec<ColumnOption>, MarkError> {
    let sheets = resolve_scope(grid, scope)?;
    let mut raw: Vec<RawHeader> = Vec::new();
    let mut layouts: Vec<SheetRoles> = Vec::new();
    for sheet in &sheets {
        let Some(roles) = detect_roles(grid, sheet, None, policy) else {
            continue;
        };
        collect_top_row(grid, &roles, &mut raw);
        collect_area_headers(grid, &roles, policy, &mut raw);
        layouts.push(roles);
    }
    if layouts.is_empty() {
        return Err(MarkError::invalid_grid("no populated sheets in scope"));
    }

    let catalog = partition(raw, &layouts);
    log::info!(
        "catalog built over {} sheet(s): {} column option(s)",
        layouts.len(),
        catalog.len()
    );
    Ok(catalog)
}

fn header_text<G: Grid + ?Sized>(grid: &G, sheet: &str, row: u32, col: u32) -> Option<String> {
    let text = grid.cell_value(sheet, row, col).to_string();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn location(sheet: &str, row: u32, col: u32) -> ColumnLocation {
    ColumnLocation {
        sheet: sheet.to_string(),
        header_row: row,
        col,
        cell: cell_reference(row, col),
    }
}

/// Row 1 is never area-tagged directly: everything there starts as `Unknown`.
fn collect_top_row<G: Grid + ?Sized>(grid: &G, roles: &SheetRoles, out: &mut Vec<RawHeader>) {
    for col in 1..=roles.max_col {
        if let Some(text) = header_text(grid, &roles.sheet, 1, col) {
            out.push(RawHeader {
                text,
                pass: ScanPass::TopRow,
                location: location(&roles.sheet, 1, col),
            });
        }
    }
}

fn collect_area_headers<G: Grid + ?Sized>(
    grid: &G,
    roles: &SheetRoles,
    policy: &DetectionPolicy,
    out: &mut Vec<RawHeader>,
) {
    let last = policy.header_scan_last_row.min(roles.max_row);
    // Header rows end where the identifier column starts holding ids.
    let data_start = (policy.header_scan_first_row..=last)
        .find(|&row| {
            is_id_shaped(
                &grid.cell_value(&roles.sheet, row, roles.id_column),
                policy.min_id_digits,
            )
        })
        .unwrap_or(last.saturating_add(1));

    for area in &roles.areas {
        for row in policy.header_scan_first_row..data_start {
            for col in area.first_col..=area.last_col.min(roles.max_col) {
                if let Some(text) = header_text(grid, &roles.sheet, row, col) {
                    out.push(RawHeader {
                        text,
                        pass: ScanPass::Area(area.kind),
                        location: location(&roles.sheet, row, col),
                    });
                }
            }
        }
    }
}

fn area_kind_of(layouts: &[SheetRoles], loc: &ColumnLocation) -> Option<ColumnKind> {
    layouts
        .iter()
        .find(|roles| roles.sheet == loc.sheet)?
        .areas
        .iter()
        .find(|area| area.kind != ColumnKind::Unknown && area.contains(loc.col))
        .map(|area| area.kind)
}

struct GroupSet {
    groups: Vec<Group>,
    index: HashMap<(ColumnKind, String), usize>,
}

impl GroupSet {
    fn new() -> Self {
        Self {
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn add(&mut self, kind: ColumnKind, header_text: &str, locations: Vec<ColumnLocation>) {
        let key = (kind, header_text.to_lowercase());
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                self.groups.push(Group {
                    kind,
                    header_text: header_text.to_string(),
                    locations: Vec::new(),
                });
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        let group = &mut self.groups[idx];
        for loc in locations {
            if !group.locations.contains(&loc) {
                group.locations.push(loc);
            }
        }
    }
}

fn partition(raw: Vec<RawHeader>, layouts: &[SheetRoles]) -> Vec<ColumnOption> {
    // Phase 2a: case-insensitive merge within each pass kind.
    let mut collected = GroupSet::new();
    for header in raw {
        let kind = match header.pass {
            ScanPass::TopRow => ColumnKind::Unknown,
            ScanPass::Area(kind) => kind,
        };
        collected.add(kind, &header.text, vec![header.location]);
    }

    // Phase 2b: groups spanning both areas split by column-range membership.
    let mut partitioned = GroupSet::new();
    for group in collected.groups {
        let mut section = Vec::new();
        let mut lecture = Vec::new();
        let mut other = Vec::new();
        for loc in &group.locations {
            match area_kind_of(layouts, loc) {
                Some(ColumnKind::Section) => section.push(loc.clone()),
                Some(ColumnKind::Lecture) => lecture.push(loc.clone()),
                _ => other.push(loc.clone()),
            }
        }
        if section.is_empty() || lecture.is_empty() {
            partitioned.add(group.kind, &group.header_text, group.locations);
            continue;
        }
        log::debug!(
            "splitting '{}' across section ({}) and lecture ({}) areas",
            group.header_text,
            section.len(),
            lecture.len()
        );
        partitioned.add(ColumnKind::Section, &group.header_text, section);
        partitioned.add(ColumnKind::Lecture, &group.header_text, lecture);
        if !other.is_empty() {
            partitioned.add(group.kind, &group.header_text, other);
        }
    }

    let mut options: Vec<ColumnOption> = partitioned
        .groups
        .into_iter()
        .map(|group| ColumnOption {
            key: option_key(group.kind, &group.header_text),
            occurrences: group.locations.len(),
            header_text: group.header_text,
            kind: group.kind,
            locations: group.locations,
        })
        .collect();
    options.sort_by_key(|o| (o.kind.as_str(), o.header_text.to_lowercase()));
    options
}

/// Finds an option by exact key, falling back to a case-insensitive header-text match.
///
/// The fallback covers keys minted by a different scan pass than the one that
/// now owns the header (row 1 versus rows 2..=5).
pub fn resolve_option<'a>(
    catalog: &'a [ColumnOption],
    key: &str,
    header_text: Option<&str>,
) -> Result<&'a ColumnOption, MarkError> {
    if let Some(option) = catalog.iter().find(|o| o.key == key) {
        return Ok(option);
    }
    let wanted = header_text
        .map(str::to_string)
        .or_else(|| key.split_once("::").map(|(_, text)| text.to_string()))
        .unwrap_or_else(|| key.to_string());
    let wanted = wanted.trim().to_lowercase();
    catalog
        .iter()
        .find(|o| o.header_text.to_lowercase() == wanted)
        .ok_or_else(|| MarkError::ColumnNotFound {
            key: key.to_string(),
        })
}
