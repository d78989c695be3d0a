//! Side-effect-free preview of every prospective cell write.
//!
//! One [`PreviewRow`] per identifier entry, in input order. The grid is only read
//! here; rows change afterwards solely through the explicit user actions
//! (`discard`, `restore`, `mark_wrong`, `manual_fix`, `set_grade`).
use crate::catalog::{resolve_option, ColumnOption};
use crate::config::DetectionPolicy;
use crate::detect::{detect_roles, ColumnKind};
use crate::error::MarkError;
use crate::grid::{cell_reference, CellValue, Grid};
use crate::idlist::{extract_id, normalize_id_text, ListEntry, ParsedIdentifierList};
use crate::roster::{build_student_index, StudentIndex};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskKind {
    IdentifierMark,
    GradeWrite,
}

impl TaskKind {
    pub fn parse(name: &str) -> Result<Self, MarkError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "identifier-mark" | "identifiermark" | "attendance" | "mark" => {
                Ok(Self::IdentifierMark)
            }
            "grade-write" | "gradewrite" | "grades" | "grade" => Ok(Self::GradeWrite),
            _ => Err(MarkError::InvalidTask {
                task: name.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    Matched,
    NotFound,
    Ambiguous,
    ManuallyFixed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRow {
    pub seq: usize,
    pub input_id: String,
    pub section: Option<usize>,
    pub sheet: String,
    pub row: Option<u32>,
    pub col: Option<u32>,
    pub resolved_id: String,
    pub resolved_name: String,
    pub target_cell: String,
    pub old_value: CellValue,
    pub new_value: CellValue,
    pub match_status: MatchStatus,
    pub discarded: bool,
    pub duplicate_count: usize,
    pub note: String,
}

/// Reporting-only: one entry per location of the selected option.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapEntry {
    pub sheet: String,
    pub header_text: String,
    pub kind: ColumnKind,
    pub header_row: u32,
    pub col: u32,
    pub cell: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    pub total: usize,
    pub matched: usize,
    pub ambiguous: usize,
    pub not_found: usize,
    pub manually_fixed: usize,
    pub discarded: usize,
    pub duplicates: usize,
}

impl PreviewSummary {
    pub fn from_rows(rows: &[PreviewRow]) -> Self {
        let mut s = PreviewSummary {
            total: rows.len(),
            ..PreviewSummary::default()
        };
        for row in rows {
            match row.match_status {
                MatchStatus::Matched => s.matched += 1,
                MatchStatus::Ambiguous => s.ambiguous += 1,
                MatchStatus::NotFound => s.not_found += 1,
                MatchStatus::ManuallyFixed => s.manually_fixed += 1,
            }
            if row.discarded {
                s.discarded += 1;
            }
            if row.duplicate_count > 1 {
                s.duplicates += 1;
            }
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub option: ColumnOption,
    pub task: TaskKind,
    pub rows: Vec<PreviewRow>,
    pub column_map: Vec<ColumnMapEntry>,
    pub summary: PreviewSummary,
}

fn blank() -> CellValue {
    CellValue::Text(String::new())
}

fn read_old_value<G: Grid + ?Sized>(grid: &G, sheet: &str, row: u32, col: u32) -> CellValue {
    match grid.cell_value(sheet, row, col) {
        CellValue::Empty => blank(),
        value => value,
    }
}

fn append_note(note: &mut String, text: &str) {
    if !note.is_empty() {
        note.push_str("; ");
    }
    note.push_str(text);
}

/// Per-sheet lookup state for the sheets that hold the selected option, in workbook order.
struct SheetTarget {
    sheet: String,
    col: u32,
    index: StudentIndex,
}

fn sheet_targets<G: Grid + ?Sized>(
    grid: &G,
    option: &ColumnOption,
    list: &ParsedIdentifierList,
    policy: &DetectionPolicy,
) -> Vec<SheetTarget> {
    grid.sheet_names()
        .into_iter()
        .filter_map(|sheet| {
            let col = option.locations.iter().find(|l| l.sheet == sheet)?.col;
            let roles = detect_roles(grid, &sheet, Some(&list.target_ids), policy)?;
            let index = build_student_index(grid, &roles, Some(&list.target_ids), policy);
            Some(SheetTarget { sheet, col, index })
        })
        .collect()
}

pub fn build_preview<G: Grid + ?Sized>(
    grid: &G,
    catalog: &[ColumnOption],
    column_key: &str,
    header_text: Option<&str>,
    task: TaskKind,
    list: &ParsedIdentifierList,
    policy: &DetectionPolicy,
) -> Result<PreviewResult, MarkError> {
    let option = resolve_option(catalog, column_key, header_text)?.clone();
    let targets = sheet_targets(grid, &option, list, policy);

    let mut rows = Vec::new();
    for entry in &list.entries {
        let ListEntry::Id {
            id,
            section,
            grade,
            line,
        } = entry
        else {
            continue;
        };
        let new_value = match task {
            TaskKind::IdentifierMark => CellValue::Number(policy.mark_sentinel),
            TaskKind::GradeWrite => match grade {
                Some(grade) => CellValue::Text(grade.clone()),
                None => {
                    return Err(MarkError::MissingGrade {
                        line: *line,
                        id: id.clone(),
                    })
                }
            },
        };
        let seq = rows.len() + 1;
        let input_id = normalize_id_text(id).unwrap_or_else(|| id.clone());
        rows.push(preview_entry(
            grid, &targets, seq, &input_id, *section, new_value, list,
        ));
    }

    let column_map = option
        .locations
        .iter()
        .map(|loc| ColumnMapEntry {
            sheet: loc.sheet.clone(),
            header_text: option.header_text.clone(),
            kind: option.kind,
            header_row: loc.header_row,
            col: loc.col,
            cell: loc.cell.clone(),
        })
        .collect();
    let summary = PreviewSummary::from_rows(&rows);
    log::info!(
        "preview for '{}': {} row(s), {} matched, {} ambiguous, {} not found",
        option.key,
        summary.total,
        summary.matched,
        summary.ambiguous,
        summary.not_found
    );
    Ok(PreviewResult {
        option,
        task,
        rows,
        column_map,
        summary,
    })
}

fn preview_entry<G: Grid + ?Sized>(
    grid: &G,
    targets: &[SheetTarget],
    seq: usize,
    input_id: &str,
    section: Option<usize>,
    new_value: CellValue,
    list: &ParsedIdentifierList,
) -> PreviewRow {
    let duplicate_count = list.count_of(input_id);
    let mut row = PreviewRow {
        seq,
        input_id: input_id.to_string(),
        section,
        sheet: String::new(),
        row: None,
        col: None,
        resolved_id: String::new(),
        resolved_name: String::new(),
        target_cell: String::new(),
        old_value: blank(),
        new_value,
        match_status: MatchStatus::NotFound,
        discarded: false,
        duplicate_count,
        note: String::new(),
    };

    let hit = targets.iter().find_map(|t| {
        let candidates = t.index.candidates(input_id);
        if candidates.is_empty() {
            None
        } else {
            Some((t, candidates))
        }
    });
    match hit {
        None => {
            row.note = "ID not found on any sheet holding the selected column".to_string();
        }
        Some((target, candidates)) => {
            let first = &candidates[0];
            row.sheet = target.sheet.clone();
            row.row = Some(first.row);
            row.col = Some(target.col);
            row.resolved_id = first.id.clone();
            row.resolved_name = first.name.clone();
            row.target_cell = cell_reference(first.row, target.col);
            row.old_value = read_old_value(grid, &target.sheet, first.row, target.col);
            if candidates.len() == 1 {
                row.match_status = MatchStatus::Matched;
            } else {
                let at: Vec<String> = candidates.iter().map(|c| c.row.to_string()).collect();
                row.match_status = MatchStatus::Ambiguous;
                row.note = format!(
                    "{} rows match this ID on '{}' (rows {}); using row {}, verify manually",
                    candidates.len(),
                    target.sheet,
                    at.join(", "),
                    first.row
                );
            }
        }
    }
    if duplicate_count > 1 {
        append_note(
            &mut row.note,
            &format!("ID appears {} times in the input", duplicate_count),
        );
    }
    row
}

impl PreviewRow {
    pub fn discard(&mut self) {
        self.discarded = true;
    }

    pub fn restore(&mut self) {
        self.discarded = false;
    }

    /// The user rejects the proposed match; the write is dropped.
    pub fn mark_wrong(&mut self) {
        self.discarded = true;
        append_note(&mut self.note, "match marked wrong by user");
    }

    pub fn set_grade(&mut self, task: TaskKind, value: CellValue) -> Result<(), MarkError> {
        if task != TaskKind::GradeWrite {
            return Err(MarkError::InvalidTask {
                task: "setGrade on an identifier-mark preview".to_string(),
            });
        }
        self.new_value = value;
        Ok(())
    }

    /// Points the entry at an explicit row on a sheet holding the selected option.
    pub fn manual_fix<G: Grid + ?Sized>(
        &mut self,
        grid: &G,
        option: &ColumnOption,
        sheet: &str,
        row: u32,
        policy: &DetectionPolicy,
    ) -> Result<(), MarkError> {
        let col = option
            .locations
            .iter()
            .find(|l| l.sheet == sheet)
            .map(|l| l.col)
            .ok_or_else(|| MarkError::ColumnNotFound {
                key: format!("{} on sheet '{}'", option.key, sheet),
            })?;
        let roles = detect_roles(grid, sheet, None, policy)
            .ok_or_else(|| MarkError::invalid_grid(format!("sheet '{sheet}' is empty")))?;
        if row < roles.first_data_row || row > roles.max_row {
            return Err(MarkError::invalid_grid(format!(
                "row {row} is outside the data rows of '{sheet}'"
            )));
        }

        let id_cell = grid.cell_value(sheet, row, roles.id_column);
        self.resolved_id = extract_id(&id_cell, None, policy.min_id_digits)
            .unwrap_or_else(|| id_cell.to_string().trim().to_string());
        self.resolved_name = roles.name_columns.read_name(grid, sheet, row);
        self.sheet = sheet.to_string();
        self.row = Some(row);
        self.col = Some(col);
        self.target_cell = cell_reference(row, col);
        self.old_value = read_old_value(grid, sheet, row, col);
        self.match_status = MatchStatus::ManuallyFixed;
        self.discarded = false;
        append_note(
            &mut self.note,
            &format!("manually assigned to {}!{}", sheet, self.target_cell),
        );
        Ok(())
    }
}
