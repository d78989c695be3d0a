use crate::grid::{Grid, MemoryWorkbook, WorkbookDocument};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_optional_str, workbook};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn io_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr {
        code: "io_failed",
        message: format!("{e:#}"),
        details: None,
    }
}

fn sheets_json(wb: &MemoryWorkbook) -> serde_json::Value {
    let sheets: Vec<serde_json::Value> = wb
        .sheet_names()
        .into_iter()
        .map(|name| {
            let (rows, cols) = wb.sheet_range(&name).unwrap_or((0, 0));
            json!({ "name": name, "rows": rows, "cols": cols })
        })
        .collect();
    json!(sheets)
}

fn workbook_open(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (mut wb, path) = if let Some(path) = get_optional_str(&req.params, "path") {
        let path = PathBuf::from(path);
        (MemoryWorkbook::open(&path).map_err(io_failed)?, Some(path))
    } else if let Some(doc) = req.params.get("document") {
        let document: WorkbookDocument = serde_json::from_value(doc.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid document: {e}")))?;
        let wb = MemoryWorkbook::from_document(document).map_err(|e| HandlerErr {
            code: "invalid_grid",
            message: e.to_string(),
            details: None,
        })?;
        (wb, None)
    } else {
        return Err(HandlerErr::bad_params("missing params.path or params.document"));
    };

    if let Some(previous) = &state.workbook {
        wb.follow_revision(previous.revision());
    }
    let dropped = state.previews.len();
    state.previews.clear();
    log::info!(
        "opened workbook with {} sheet(s), dropped {} pending preview(s)",
        wb.sheet_names().len(),
        dropped
    );
    let result = json!({
        "workbookPath": path.as_ref().map(|p| p.to_string_lossy().to_string()),
        "revision": wb.revision(),
        "sheets": sheets_json(&wb),
    });
    state.workbook = Some(wb);
    state.workbook_path = path;
    Ok(result)
}

fn workbook_save(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let wb = workbook(state)?;
    let out = match get_optional_str(&req.params, "outPath") {
        Some(p) => PathBuf::from(p),
        None => state
            .workbook_path
            .clone()
            .ok_or_else(|| HandlerErr::bad_params("missing params.outPath"))?,
    };
    wb.save(&out).map_err(io_failed)?;
    Ok(json!({ "path": out.to_string_lossy(), "revision": wb.revision() }))
}

fn workbook_sheets(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let wb = workbook(state)?;
    Ok(json!({ "revision": wb.revision(), "sheets": sheets_json(wb) }))
}

fn workbook_export(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let wb = workbook(state)?;
    let document = wb.to_document();
    match get_optional_str(&req.params, "sheet") {
        None => Ok(json!({ "revision": wb.revision(), "document": document })),
        Some(name) => {
            let sheet = document
                .sheets
                .into_iter()
                .find(|s| s.name == name)
                .ok_or_else(|| HandlerErr {
                    code: "not_found",
                    message: format!("sheet '{name}' not found"),
                    details: None,
                })?;
            Ok(json!({ "revision": wb.revision(), "sheet": sheet }))
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "workbook.open" => workbook_open(state, req),
        "workbook.save" => workbook_save(state, req),
        "workbook.sheets" => workbook_sheets(state, req),
        "workbook.export" => workbook_export(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}

