use crate::config::DetectionPolicy;
use crate::grid::MemoryWorkbook;
use crate::preview::PreviewResult;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A computed preview waiting for approval.
pub struct PreviewBatch {
    pub id: String,
    pub created_at: String,
    /// Workbook revision the preview was read from.
    pub revision: u64,
    pub result: PreviewResult,
}

pub struct AppState {
    pub workbook: Option<MemoryWorkbook>,
    pub workbook_path: Option<PathBuf>,
    pub policy: DetectionPolicy,
    pub previews: HashMap<String, PreviewBatch>,
}

impl AppState {
    pub fn new(policy: DetectionPolicy) -> Self {
        Self {
            workbook: None,
            workbook_path: None,
            policy,
            previews: HashMap::new(),
        }
    }
}
