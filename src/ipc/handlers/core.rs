use crate::grid::Grid;
use crate::ipc::error::ok;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workbookPath": state.workbook_path.as_ref().map(|p| p.to_string_lossy().to_string()),
            "sheetCount": state.workbook.as_ref().map(|wb| wb.sheet_names().len()),
            "pendingPreviews": state.previews.len(),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
