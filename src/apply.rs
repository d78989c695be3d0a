use crate::error::MarkError;
use crate::grid::Grid;
use crate::preview::{MatchStatus, PreviewRow};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteFailure {
    pub seq: usize,
    pub sheet: String,
    pub target_cell: String,
    pub code: &'static str,
    pub message: String,
}

impl WriteFailure {
    fn new(row: &PreviewRow, error: MarkError) -> Self {
        Self {
            seq: row.seq,
            sheet: row.sheet.clone(),
            target_cell: row.target_cell.clone(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub written: usize,
    pub skipped_discarded: usize,
    pub skipped_not_found: usize,
    /// Stored type per written cell, keyed by preview sequence number.
    pub written_types: Vec<(usize, &'static str)>,
    pub highlight: Option<String>,
    pub failures: Vec<WriteFailure>,
}

/// Uppercased 6-hex-digit color, accepting an optional leading `#`.
pub fn parse_fill_color(raw: &str) -> Option<String> {
    let t = raw.trim();
    let t = t.strip_prefix('#').unwrap_or(t);
    if t.len() == 6 && t.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(t.to_ascii_uppercase())
    } else {
        None
    }
}

/// Writes every approved row into the grid.
///
/// Discarded and not-found rows are skipped. A failed cell write is recorded and
/// the batch carries on; earlier writes are not undone. An unusable highlight color
/// is replaced by `default_highlight` instead of failing the batch.
pub fn apply_preview<G: Grid + ?Sized>(
    grid: &mut G,
    rows: &[PreviewRow],
    highlight: Option<&str>,
    default_highlight: &str,
) -> ApplyReport {
    let fill = highlight.map(|raw| {
        parse_fill_color(raw).unwrap_or_else(|| {
            log::warn!(
                "highlight color '{}' is not 6 hex digits, using {}",
                raw,
                default_highlight
            );
            parse_fill_color(default_highlight).unwrap_or_else(|| "FFFF00".to_string())
        })
    });

    let mut report = ApplyReport {
        highlight: fill.clone(),
        ..ApplyReport::default()
    };
    for row in rows {
        if row.discarded {
            report.skipped_discarded += 1;
            continue;
        }
        if row.match_status == MatchStatus::NotFound {
            report.skipped_not_found += 1;
            continue;
        }
        let (Some(r), Some(c)) = (row.row, row.col) else {
            report.failures.push(WriteFailure::new(
                row,
                MarkError::invalid_grid("row has no target cell"),
            ));
            continue;
        };
        match grid.write_cell(&row.sheet, r, c, row.new_value.clone(), fill.as_deref()) {
            Ok(()) => {
                report.written += 1;
                report.written_types.push((row.seq, row.new_value.kind_name()));
            }
            Err(e) => {
                log::warn!(
                    "write to {}!{} failed for entry {}: {}",
                    row.sheet,
                    row.target_cell,
                    row.seq,
                    e
                );
                report.failures.push(WriteFailure::new(row, MarkError::from(e)));
            }
        }
    }
    log::info!(
        "applied {} write(s), skipped {} discarded and {} not found, {} failure(s)",
        report.written,
        report.skipped_discarded,
        report.skipped_not_found,
        report.failures.len()
    );
    report
}
