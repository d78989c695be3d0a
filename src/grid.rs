//! Grid access.
//!
//! The marking core never decodes spreadsheet files itself. It reads and writes
//! through the [`Grid`] trait, with 1-based row and column addressing throughout.
//! [`MemoryWorkbook`] is the implementation the sidecar hosts: a set of named
//! sheets loaded from a JSON workbook document and serialized back to one.
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GridError {
    #[error("sheet '{0}' not found")]
    UnknownSheet(String),

    #[error("cell ({row}, {col}) is outside the addressable grid")]
    OutOfRange { row: u32, col: u32 },

    #[error("duplicate sheet name '{0}'")]
    DuplicateSheet(String),

    #[error("sheet name must not be empty")]
    EmptySheetName,

    #[error("{0}")]
    Serialize(#[from] serde_json::Error),
}

/// A single cell value as seen through the grid.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Empty,
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Stored type tag, used when a write reports what it put in the cell.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Boolean(v) => write!(f, "{}", v),
            // Whole numbers print without the trailing ".0" spreadsheets hand back.
            Self::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            Self::Number(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Caller-provided spreadsheet accessor.
///
/// Reads never fail: anything outside the populated area is [`CellValue::Empty`].
/// Only the edit applier calls [`Grid::write_cell`].
pub trait Grid {
    /// Sheet names in workbook order; stable for the grid's lifetime.
    fn sheet_names(&self) -> Vec<String>;

    fn cell_value(&self, sheet: &str, row: u32, col: u32) -> CellValue;

    /// Inclusive `(max_row, max_col)` over populated cells, `None` for an empty or unknown sheet.
    fn sheet_range(&self, sheet: &str) -> Option<(u32, u32)>;

    /// Full replace: value and fill are both overwritten, any previous fill is dropped.
    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        value: CellValue,
        fill: Option<&str>,
    ) -> Result<(), GridError>;

    /// Grid contents in the grid's native format.
    fn serialize(&self) -> Result<Vec<u8>, GridError>;
}

/// Converts 1-based row and column numbers to an A1-style reference.
pub fn cell_reference(row: u32, col: u32) -> String {
    let mut column = col;
    let mut position = String::new();
    while column > 0 {
        column -= 1;
        let digit = char::from_u32(65 + column % 26).expect("Hardcode letters");
        column /= 26;
        position.insert(0, digit);
    }
    position.push_str(&row.to_string());
    position
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredCell {
    pub value: CellValue,
    pub fill: Option<String>,
}

#[derive(Clone, Debug)]
struct MemorySheet {
    name: String,
    cells: BTreeMap<(u32, u32), StoredCell>,
}

impl MemorySheet {
    fn range(&self) -> Option<(u32, u32)> {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.value != CellValue::Empty)
            .map(|(&(row, col), _)| (row, col))
            .fold(None, |acc, (row, col)| match acc {
                None => Some((row, col)),
                Some((r, c)) => Some((r.max(row), c.max(col))),
            })
    }
}

/// JSON workbook document: the sidecar's load and save format.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkbookDocument {
    pub sheets: Vec<SheetDocument>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SheetDocument {
    pub name: String,
    /// Row-major cells starting at A1; `null` for blanks.
    #[serde(default)]
    pub rows: Vec<Vec<CellValue>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fills: Vec<FillDocument>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FillDocument {
    pub row: u32,
    pub col: u32,
    pub color: String,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryWorkbook {
    sheets: Vec<MemorySheet>,
    revision: u64,
}

impl MemoryWorkbook {
    pub fn from_document(document: WorkbookDocument) -> Result<Self, GridError> {
        let mut sheets: Vec<MemorySheet> = Vec::with_capacity(document.sheets.len());
        for sheet in document.sheets {
            let name = sheet.name.trim().to_string();
            if name.is_empty() {
                return Err(GridError::EmptySheetName);
            }
            if sheets.iter().any(|s| s.name == name) {
                return Err(GridError::DuplicateSheet(name));
            }
            let mut cells = BTreeMap::new();
            for (r, row) in sheet.rows.into_iter().enumerate() {
                for (c, value) in row.into_iter().enumerate() {
                    if value == CellValue::Empty {
                        continue;
                    }
                    cells.insert(
                        (r as u32 + 1, c as u32 + 1),
                        StoredCell { value, fill: None },
                    );
                }
            }
            for fill in sheet.fills {
                if fill.row == 0 || fill.col == 0 {
                    return Err(GridError::OutOfRange {
                        row: fill.row,
                        col: fill.col,
                    });
                }
                cells
                    .entry((fill.row, fill.col))
                    .or_insert_with(|| StoredCell {
                        value: CellValue::Empty,
                        fill: None,
                    })
                    .fill = Some(fill.color);
            }
            sheets.push(MemorySheet { name, cells });
        }
        Ok(Self { sheets, revision: 0 })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, GridError> {
        let document: WorkbookDocument = serde_json::from_slice(bytes)?;
        Self::from_document(document)
    }

    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read workbook {}", path.to_string_lossy()))?;
        Self::from_json(&bytes)
            .with_context(|| format!("failed to parse workbook {}", path.to_string_lossy()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create directory {}", parent.to_string_lossy())
            })?;
        }
        let bytes = self.serialize().context("failed to serialize workbook")?;
        std::fs::write(path, bytes)
            .with_context(|| format!("failed to write workbook {}", path.to_string_lossy()))
    }

    pub fn to_document(&self) -> WorkbookDocument {
        let sheets = self
            .sheets
            .iter()
            .map(|sheet| {
                let (max_row, max_col) = sheet.range().unwrap_or((0, 0));
                let mut rows = vec![vec![CellValue::Empty; max_col as usize]; max_row as usize];
                let mut fills = Vec::new();
                for (&(row, col), cell) in &sheet.cells {
                    if row <= max_row && col <= max_col {
                        rows[row as usize - 1][col as usize - 1] = cell.value.clone();
                    }
                    if let Some(color) = &cell.fill {
                        fills.push(FillDocument {
                            row,
                            col,
                            color: color.clone(),
                        });
                    }
                }
                SheetDocument {
                    name: sheet.name.clone(),
                    rows,
                    fills,
                }
            })
            .collect();
        WorkbookDocument { sheets }
    }

    /// Bumped on every write and reload; previews remember it to detect a changed grid.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Continues the revision sequence of the workbook this one replaces.
    pub fn follow_revision(&mut self, previous: u64) {
        self.revision = previous.saturating_add(1);
    }

    pub fn stored_cell(&self, sheet: &str, row: u32, col: u32) -> Option<&StoredCell> {
        self.sheet(sheet)?.cells.get(&(row, col))
    }

    fn sheet(&self, name: &str) -> Option<&MemorySheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

impl Grid for MemoryWorkbook {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn cell_value(&self, sheet: &str, row: u32, col: u32) -> CellValue {
        self.stored_cell(sheet, row, col)
            .map(|cell| cell.value.clone())
            .unwrap_or_default()
    }

    fn sheet_range(&self, sheet: &str) -> Option<(u32, u32)> {
        self.sheet(sheet)?.range()
    }

    fn write_cell(
        &mut self,
        sheet: &str,
        row: u32,
        col: u32,
        value: CellValue,
        fill: Option<&str>,
    ) -> Result<(), GridError> {
        if row == 0 || col == 0 {
            return Err(GridError::OutOfRange { row, col });
        }
        let target = self
            .sheets
            .iter_mut()
            .find(|s| s.name == sheet)
            .ok_or_else(|| GridError::UnknownSheet(sheet.to_string()))?;
        target.cells.insert(
            (row, col),
            StoredCell {
                value,
                fill: fill.map(str::to_string),
            },
        );
        self.revision += 1;
        Ok(())
    }

    fn serialize(&self) -> Result<Vec<u8>, GridError> {
        Ok(serde_json::to_vec_pretty(&self.to_document())?)
    }
}
