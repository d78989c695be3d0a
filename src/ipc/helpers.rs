use crate::grid::MemoryWorkbook;
use crate::ipc::error::HandlerErr;
use crate::ipc::types::AppState;
use serde_json::Value;

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn get_required_u64(params: &Value, key: &str) -> Result<u64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn no_workbook() -> HandlerErr {
    HandlerErr {
        code: "no_workbook",
        message: "open a workbook first".to_string(),
        details: None,
    }
}

pub fn workbook(state: &AppState) -> Result<&MemoryWorkbook, HandlerErr> {
    state.workbook.as_ref().ok_or_else(no_workbook)
}
