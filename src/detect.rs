//! Column role detection.
//!
//! Sheets arrive without reliable headers, so the identifier column, the name
//! column(s) and the structural areas are inferred from cell contents. Every
//! threshold comes from [`DetectionPolicy`].
use crate::config::DetectionPolicy;
use crate::grid::{CellValue, Grid};
use crate::idlist::{extract_id, is_id_shaped};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKind {
    Lecture,
    Section,
    Unknown,
}

impl ColumnKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lecture => "lecture",
            Self::Section => "section",
            Self::Unknown => "unknown",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "lecture" => Some(Self::Lecture),
            "section" => Some(Self::Section),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

/// Contiguous, inclusive column range sharing one structural role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnArea {
    pub kind: ColumnKind,
    pub first_col: u32,
    pub last_col: u32,
}

impl ColumnArea {
    pub fn contains(&self, col: u32) -> bool {
        self.first_col <= col && col <= self.last_col
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NameColumns {
    Single { col: u32 },
    Pair { first: u32, second: u32 },
}

impl NameColumns {
    pub fn contains(&self, col: u32) -> bool {
        match *self {
            Self::Single { col: c } => c == col,
            Self::Pair { first, second } => first == col || second == col,
        }
    }

    /// Display name for a row; two columns are joined with a space.
    pub fn read_name<G: Grid + ?Sized>(&self, grid: &G, sheet: &str, row: u32) -> String {
        match *self {
            Self::Single { col } => grid.cell_value(sheet, row, col).to_string().trim().to_string(),
            Self::Pair { first, second } => {
                let a = grid.cell_value(sheet, row, first).to_string();
                let b = grid.cell_value(sheet, row, second).to_string();
                format!("{} {}", a.trim(), b.trim()).trim().to_string()
            }
        }
    }
}

/// Which rule settled the identifier column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IdColumnRule {
    TargetMatches,
    IdShape,
    LooseRescan,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetRoles {
    pub sheet: String,
    pub max_row: u32,
    pub max_col: u32,
    pub first_data_row: u32,
    pub name_columns: NameColumns,
    pub id_column: u32,
    pub id_rule: IdColumnRule,
    pub areas: Vec<ColumnArea>,
}

/// Infers name, identifier and area layout for one sheet. `None` when the sheet is empty.
pub fn detect_roles<G: Grid + ?Sized>(
    grid: &G,
    sheet: &str,
    targets: Option<&BTreeSet<String>>,
    policy: &DetectionPolicy,
) -> Option<SheetRoles> {
    let (max_row, max_col) = grid.sheet_range(sheet)?;
    let first_data_row = first_data_row(grid, sheet, max_row, max_col, policy);
    let name_columns = detect_name_columns(grid, sheet, first_data_row, max_row, max_col, policy);
    let (id_column, id_rule) = detect_id_column(
        grid,
        sheet,
        first_data_row,
        max_row,
        max_col,
        &name_columns,
        targets,
        policy,
    );
    let areas = detect_areas(grid, sheet, max_col, policy);
    log::debug!(
        "sheet '{}': data from row {}, names {:?}, id column {} ({:?}), {} area(s)",
        sheet,
        first_data_row,
        name_columns,
        id_column,
        id_rule,
        areas.len()
    );
    Some(SheetRoles {
        sheet: sheet.to_string(),
        max_row,
        max_col,
        first_data_row,
        name_columns,
        id_column,
        id_rule,
        areas,
    })
}

/// First row after the header row holding any id-shaped cell; row 2 when none does.
fn first_data_row<G: Grid + ?Sized>(
    grid: &G,
    sheet: &str,
    max_row: u32,
    max_col: u32,
    policy: &DetectionPolicy,
) -> u32 {
    let last_probe = max_row.min(policy.scan_window_rows.saturating_add(1));
    (2..=last_probe)
        .find(|&row| {
            (1..=max_col).any(|col| {
                is_id_shaped(&grid.cell_value(sheet, row, col), policy.min_id_digits)
            })
        })
        .unwrap_or(2)
}

fn scan_window(first_data_row: u32, max_row: u32, policy: &DetectionPolicy) -> (u32, u32) {
    let span = policy.scan_window_rows.saturating_sub(1);
    let last = max_row.min(first_data_row.saturating_add(span));
    (first_data_row, last)
}

fn looks_like_name(value: &CellValue, policy: &DetectionPolicy) -> bool {
    match value {
        CellValue::Text(s) => {
            s.chars().any(char::is_alphabetic) && !is_id_shaped(value, policy.min_id_digits)
        }
        _ => false,
    }
}

fn exceeds(count: usize, scanned: usize, ratio: f64) -> bool {
    scanned > 0 && (count as f64) / (scanned as f64) > ratio
}

fn detect_name_columns<G: Grid + ?Sized>(
    grid: &G,
    sheet: &str,
    first_data_row: u32,
    max_row: u32,
    max_col: u32,
    policy: &DetectionPolicy,
) -> NameColumns {
    let (start, end) = scan_window(first_data_row, max_row, policy);
    let scanned = if end >= start { (end - start + 1) as usize } else { 0 };
    let qualifying: Vec<u32> = (1..=max_col.min(policy.name_scan_columns))
        .filter(|&col| {
            let names = (start..=end)
                .filter(|&row| looks_like_name(&grid.cell_value(sheet, row, col), policy))
                .count();
            exceeds(names, scanned, policy.name_ratio)
        })
        .collect();

    if let Some(pair) = qualifying.windows(2).find(|w| w[1] == w[0] + 1) {
        return NameColumns::Pair {
            first: pair[0],
            second: pair[1],
        };
    }
    match qualifying.first() {
        Some(&col) => NameColumns::Single { col },
        None => NameColumns::Single { col: 1 },
    }
}

#[allow(clippy::too_many_arguments)]
fn detect_id_column<G: Grid + ?Sized>(
    grid: &G,
    sheet: &str,
    first_data_row: u32,
    max_row: u32,
    max_col: u32,
    names: &NameColumns,
    targets: Option<&BTreeSet<String>>,
    policy: &DetectionPolicy,
) -> (u32, IdColumnRule) {
    let candidates: Vec<u32> = (1..=max_col).filter(|&c| !names.contains(c)).collect();

    if let Some(targets) = targets {
        // Whole data range: target rows can sit anywhere in a long roster.
        let mut best: Option<(u32, usize)> = None;
        for &col in &candidates {
            let hits = (first_data_row..=max_row)
                .filter(|&row| {
                    extract_id(&grid.cell_value(sheet, row, col), Some(targets), policy.min_id_digits)
                        .is_some()
                })
                .count();
            // Strict `>` keeps the first column scanned on ties.
            if hits > 0 && best.map(|(_, n)| hits > n).unwrap_or(true) {
                best = Some((col, hits));
            }
        }
        if let Some((col, _)) = best {
            return (col, IdColumnRule::TargetMatches);
        }
    } else {
        let (start, end) = scan_window(first_data_row, max_row, policy);
        let scanned = if end >= start { (end - start + 1) as usize } else { 0 };
        let mut best: Option<(u32, f64)> = None;
        for &col in &candidates {
            let shaped = (start..=end)
                .filter(|&row| is_id_shaped(&grid.cell_value(sheet, row, col), policy.min_id_digits))
                .count();
            if !exceeds(shaped, scanned, policy.id_ratio) {
                continue;
            }
            let score = shaped as f64 / scanned as f64;
            if best.map(|(_, s)| score > s).unwrap_or(true) {
                best = Some((col, score));
            }
        }
        if let Some((col, _)) = best {
            return (col, IdColumnRule::IdShape);
        }
    }

    if let Some(col) = loose_rescan(grid, sheet, max_row, &candidates, policy) {
        log::warn!("sheet '{}': id column {} found only by loose rescan", sheet, col);
        return (col, IdColumnRule::LooseRescan);
    }
    log::warn!(
        "sheet '{}': no id column detected, using column {}",
        sheet,
        policy.fallback_id_column
    );
    (policy.fallback_id_column, IdColumnRule::Fallback)
}

/// First column whose populated cells in the rows right under the header are mostly id-shaped.
fn loose_rescan<G: Grid + ?Sized>(
    grid: &G,
    sheet: &str,
    max_row: u32,
    candidates: &[u32],
    policy: &DetectionPolicy,
) -> Option<u32> {
    let end = max_row.min(policy.scan_window_rows.saturating_add(1));
    candidates.iter().copied().find(|&col| {
        let mut filled = 0usize;
        let mut shaped = 0usize;
        for row in 2..=end {
            let value = grid.cell_value(sheet, row, col);
            if value.is_empty() {
                continue;
            }
            filled += 1;
            if is_id_shaped(&value, policy.min_id_digits) {
                shaped += 1;
            }
        }
        exceeds(shaped, filled, policy.id_ratio)
    })
}

/// Splits the sheet into section and lecture areas from the row-1 markers.
///
/// Without a section marker the whole width is one `Unknown` area.
pub fn detect_areas<G: Grid + ?Sized>(
    grid: &G,
    sheet: &str,
    max_col: u32,
    policy: &DetectionPolicy,
) -> Vec<ColumnArea> {
    let section_marker = policy.section_marker.to_lowercase();
    let lecture_marker = policy.lecture_marker.to_lowercase();
    let mut section_col: Option<u32> = None;
    let mut lecture_col: Option<u32> = None;
    for col in 1..=max_col {
        let text = grid.cell_value(sheet, 1, col).to_string().to_lowercase();
        if section_col.is_none() && text.contains(&section_marker) {
            section_col = Some(col);
        } else if lecture_col.is_none() && text.contains(&lecture_marker) {
            lecture_col = Some(col);
        }
    }

    let Some(sc) = section_col else {
        return vec![ColumnArea {
            kind: ColumnKind::Unknown,
            first_col: 1,
            last_col: max_col,
        }];
    };
    match lecture_col {
        Some(lc) if lc > sc => vec![
            ColumnArea {
                kind: ColumnKind::Section,
                first_col: sc,
                last_col: lc - 1,
            },
            ColumnArea {
                kind: ColumnKind::Lecture,
                first_col: lc,
                last_col: max_col,
            },
        ],
        Some(lc) => vec![
            ColumnArea {
                kind: ColumnKind::Lecture,
                first_col: lc,
                last_col: sc - 1,
            },
            ColumnArea {
                kind: ColumnKind::Section,
                first_col: sc,
                last_col: max_col,
            },
        ],
        None => vec![ColumnArea {
            kind: ColumnKind::Section,
            first_col: sc,
            last_col: max_col,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::tests::workbook;
    use serde_json::json;

    fn policy() -> DetectionPolicy {
        DetectionPolicy::default()
    }

    #[test]
    fn adjacent_name_columns_are_paired_and_id_found_by_shape() {
        let wb = workbook(json!([{
            "name": "Roster",
            "rows": [
                ["#", "First", "Last", "Student ID", "W1"],
                [1, "Ann", "Lee", 202300001, null],
                [2, "Bo", "Chan", 202300002, 1],
                [3, "Cy", "Diaz", "202300003", null]
            ]
        }]));
        let roles = detect_roles(&wb, "Roster", None, &policy()).expect("roles");
        assert_eq!(roles.first_data_row, 2);
        assert_eq!(roles.name_columns, NameColumns::Pair { first: 2, second: 3 });
        assert_eq!(roles.id_column, 4);
        assert_eq!(roles.id_rule, IdColumnRule::IdShape);
        assert_eq!(roles.name_columns.read_name(&wb, "Roster", 3), "Bo Chan");
    }

    #[test]
    fn target_set_picks_column_with_most_hits_and_first_on_ties() {
        let wb = workbook(json!([{
            "name": "S",
            "rows": [
                ["Name", "Old ID", "New ID"],
                ["Ann", 111111, 111111],
                ["Bo", 222222, "222222@school.example"],
                ["Cy", 999999, 333333]
            ]
        }]));
        let targets: BTreeSet<String> = ["111111", "222222", "333333"]
            .into_iter()
            .map(String::from)
            .collect();
        let roles = detect_roles(&wb, "S", Some(&targets), &policy()).expect("roles");
        assert_eq!(roles.name_columns, NameColumns::Single { col: 1 });
        assert_eq!(roles.id_column, 3);
        assert_eq!(roles.id_rule, IdColumnRule::TargetMatches);

        let tie: BTreeSet<String> = ["111111"].into_iter().map(String::from).collect();
        let roles = detect_roles(&wb, "S", Some(&tie), &policy()).expect("roles");
        assert_eq!(roles.id_column, 2);
    }

    #[test]
    fn equally_id_shaped_columns_resolve_to_the_first_scanned() {
        let wb = workbook(json!([{
            "name": "S",
            "rows": [
                ["Name", "Student ID", "Card"],
                ["Ann", 111111, 222222],
                ["Bo", 333333, 444444]
            ]
        }]));
        let roles = detect_roles(&wb, "S", None, &policy()).expect("roles");
        assert_eq!(roles.id_column, 2);
        assert_eq!(roles.id_rule, IdColumnRule::IdShape);
    }

    #[test]
    fn unbounded_scan_window_is_clamped_to_the_sheet() {
        let wb = workbook(json!([{
            "name": "S",
            "rows": [["Name", "ID"], ["Ann", 123456], ["Bo", null], ["Cy", null], ["Di", 234567]]
        }]));
        let wide = DetectionPolicy {
            scan_window_rows: u32::MAX,
            ..DetectionPolicy::default()
        };
        let roles = detect_roles(&wb, "S", None, &wide).expect("roles");
        assert_eq!(roles.first_data_row, 2);
        assert_eq!(roles.id_column, 2);
    }

    #[test]
    fn falls_back_to_fixed_column_when_nothing_is_id_shaped() {
        let wb = workbook(json!([{
            "name": "S",
            "rows": [["Name", "Code"], ["Ann", "x1"], ["Bo", "x2"]]
        }]));
        let roles = detect_roles(&wb, "S", None, &policy()).expect("roles");
        assert_eq!(roles.id_column, 2);
        assert_eq!(roles.id_rule, IdColumnRule::Fallback);
        assert!(detect_roles(&wb, "Missing", None, &policy()).is_none());
    }

    #[test]
    fn loose_rescan_ignores_blank_rows() {
        // Mostly blank id column: strict window share stays under half, populated share is all ids.
        let wb = workbook(json!([{
            "name": "S",
            "rows": [
                ["Name", "ID"],
                ["Ann", 123456],
                ["Bo", null],
                ["Cy", null],
                ["Di", null],
                ["Ed", 234567]
            ]
        }]));
        let roles = detect_roles(&wb, "S", None, &policy()).expect("roles");
        assert_eq!(roles.id_column, 2);
        assert_eq!(roles.id_rule, IdColumnRule::LooseRescan);
    }

    #[test]
    fn area_markers_split_section_and_lecture() {
        let wb = workbook(json!([{
            "name": "S",
            "rows": [[null, null, "Attendance Section", null, null, null, null, "ATTENDANCE LECTURE", null, null]]
        }]));
        let areas = detect_areas(&wb, "S", 10, &policy());
        assert_eq!(
            areas,
            vec![
                ColumnArea { kind: ColumnKind::Section, first_col: 3, last_col: 7 },
                ColumnArea { kind: ColumnKind::Lecture, first_col: 8, last_col: 10 },
            ]
        );
    }

    #[test]
    fn no_section_marker_means_one_unknown_area() {
        let wb = workbook(json!([{ "name": "S", "rows": [["Name", "Attendance Lecture", "W1"]] }]));
        let areas = detect_areas(&wb, "S", 3, &policy());
        assert_eq!(
            areas,
            vec![ColumnArea { kind: ColumnKind::Unknown, first_col: 1, last_col: 3 }]
        );
    }
}
