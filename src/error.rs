use crate::grid::GridError;
use thiserror::Error;

/// Failures raised by the marking core. Every kind is reported at the point of
/// detection and surfaced to the caller verbatim.
#[derive(Error, Debug)]
pub enum MarkError {
    #[error("no valid identifier entries found in input")]
    EmptyInput,

    #[error("line {line}: identifier {id} has no grade")]
    MissingGrade { line: usize, id: String },

    #[error("unknown task kind '{task}'")]
    InvalidTask { task: String },

    #[error("column '{key}' not found in the current workbook")]
    ColumnNotFound { key: String },

    #[error("invalid grid: {reason}")]
    InvalidGrid { reason: String },

    #[error("{0}")]
    Grid(#[from] GridError),
}

impl MarkError {
    /// Stable wire code used in sidecar error replies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput => "empty_input",
            Self::MissingGrade { .. } => "missing_grade",
            Self::InvalidTask { .. } => "invalid_task",
            Self::ColumnNotFound { .. } => "column_not_found",
            Self::InvalidGrid { .. } => "invalid_grid",
            Self::Grid(_) => "grid_write_failed",
        }
    }

    pub(crate) fn invalid_grid(reason: impl Into<String>) -> Self {
        Self::InvalidGrid {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_snake_case_and_messages_carry_context() {
        let e = MarkError::MissingGrade {
            line: 3,
            id: "123456".to_string(),
        };
        assert_eq!(e.code(), "missing_grade");
        assert_eq!(e.to_string(), "line 3: identifier 123456 has no grade");
        assert_eq!(
            MarkError::ColumnNotFound {
                key: "section::W1".to_string()
            }
            .code(),
            "column_not_found"
        );
    }
}
