use crate::apply::apply_preview;
use crate::catalog::{build_catalog, CatalogScope};
use crate::grid::CellValue;
use crate::idlist::{parse_identifier_list, ListMode};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, get_required_u64, no_workbook, workbook,
};
use crate::ipc::types::{AppState, PreviewBatch, Request};
use crate::preview::{build_preview, PreviewSummary, TaskKind};
use serde_json::json;

fn batch_not_found(batch_id: &str) -> HandlerErr {
    HandlerErr {
        code: "not_found",
        message: format!("preview batch not found: {batch_id}"),
        details: None,
    }
}

fn batch_json(batch: &PreviewBatch) -> serde_json::Value {
    json!({
        "batchId": batch.id,
        "createdAt": batch.created_at,
        "revision": batch.revision,
        "option": batch.result.option,
        "task": batch.result.task,
        "rows": batch.result.rows,
        "columnMap": batch.result.column_map,
        "summary": batch.result.summary,
    })
}

fn preview_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let wb = workbook(state)?;
    let column_key = get_required_str(&req.params, "columnKey")?;
    let header_text = get_optional_str(&req.params, "headerText");
    let task = TaskKind::parse(&get_required_str(&req.params, "task")?)?;
    let Some(text) = req.params.get("text").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("missing params.text"));
    };
    let mode = match task {
        TaskKind::IdentifierMark => ListMode::Identifiers,
        TaskKind::GradeWrite => ListMode::Grades,
    };
    let scope = match get_optional_str(&req.params, "sheet") {
        Some(sheet) => CatalogScope::Sheet(sheet),
        None => CatalogScope::AllSheets,
    };

    let list = parse_identifier_list(text, mode, state.policy.min_id_digits)?;
    let catalog = build_catalog(wb, &scope, &state.policy)?;
    let result = build_preview(
        wb,
        &catalog,
        &column_key,
        header_text.as_deref(),
        task,
        &list,
        &state.policy,
    )?;

    let batch = PreviewBatch {
        id: uuid::Uuid::new_v4().to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        revision: wb.revision(),
        result,
    };
    let duplicates: Vec<serde_json::Value> = list
        .duplicates()
        .into_iter()
        .map(|(id, count)| json!({ "id": id, "count": count }))
        .collect();
    let mut out = batch_json(&batch);
    out["duplicates"] = json!(duplicates);
    log::debug!("stored preview batch {}", batch.id);
    state.previews.insert(batch.id.clone(), batch);
    Ok(out)
}

fn preview_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let batch_id = get_required_str(&req.params, "batchId")?;
    let batch = state
        .previews
        .get(&batch_id)
        .ok_or_else(|| batch_not_found(&batch_id))?;
    Ok(batch_json(batch))
}

fn grade_value(raw: Option<&serde_json::Value>) -> Result<CellValue, HandlerErr> {
    let text = match raw {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => match n.as_f64() {
            Some(f) => CellValue::Number(f).to_string(),
            None => n.to_string(),
        },
        _ => String::new(),
    };
    if text.is_empty() {
        return Err(HandlerErr::bad_params("missing params.value"));
    }
    Ok(CellValue::Text(text))
}

fn preview_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let batch_id = get_required_str(&req.params, "batchId")?;
    let seq = get_required_u64(&req.params, "seq")? as usize;
    let action = get_required_str(&req.params, "action")?;

    let AppState {
        workbook: slot,
        policy,
        previews,
        ..
    } = state;
    let batch = previews
        .get_mut(&batch_id)
        .ok_or_else(|| batch_not_found(&batch_id))?;
    let task = batch.result.task;
    let option = batch.result.option.clone();
    let row = batch
        .result
        .rows
        .iter_mut()
        .find(|r| r.seq == seq)
        .ok_or_else(|| HandlerErr::bad_params(format!("no preview row with seq {seq}")))?;

    match action.as_str() {
        "discard" => row.discard(),
        "restore" => row.restore(),
        "markWrong" => row.mark_wrong(),
        "setGrade" => row.set_grade(task, grade_value(req.params.get("value"))?)?,
        "manualFix" => {
            let wb = slot.as_ref().ok_or_else(no_workbook)?;
            if wb.revision() != batch.revision {
                return Err(stale(batch.revision, wb.revision()));
            }
            let sheet = get_required_str(&req.params, "sheet")?;
            let target_row = get_required_u64(&req.params, "row")?;
            let target_row = u32::try_from(target_row)
                .map_err(|_| HandlerErr::bad_params("row out of range"))?;
            row.manual_fix(wb, &option, &sheet, target_row, policy)?;
        }
        other => {
            return Err(HandlerErr::bad_params(format!(
                "unknown preview action: {other}"
            )))
        }
    }

    let row = json!(row);
    batch.result.summary = PreviewSummary::from_rows(&batch.result.rows);
    Ok(json!({ "row": row, "summary": batch.result.summary }))
}

fn stale(batch_revision: u64, current: u64) -> HandlerErr {
    HandlerErr {
        code: "stale_preview",
        message: "workbook changed since the preview was built".to_string(),
        details: Some(json!({ "previewRevision": batch_revision, "workbookRevision": current })),
    }
}

fn preview_apply(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let batch_id = get_required_str(&req.params, "batchId")?;
    let highlight = get_optional_str(&req.params, "highlightColor");

    let current = workbook(state)?.revision();
    let batch_revision = state
        .previews
        .get(&batch_id)
        .map(|b| b.revision)
        .ok_or_else(|| batch_not_found(&batch_id))?;
    if batch_revision != current {
        return Err(stale(batch_revision, current));
    }
    let Some(batch) = state.previews.remove(&batch_id) else {
        return Err(batch_not_found(&batch_id));
    };
    let wb = state.workbook.as_mut().ok_or_else(no_workbook)?;
    let report = apply_preview(
        wb,
        &batch.result.rows,
        highlight.as_deref(),
        &state.policy.default_highlight,
    );
    let written_types: Vec<serde_json::Value> = report
        .written_types
        .iter()
        .map(|(seq, kind)| json!({ "seq": seq, "type": kind }))
        .collect();
    Ok(json!({
        "batchId": batch.id,
        "written": report.written,
        "skippedDiscarded": report.skipped_discarded,
        "skippedNotFound": report.skipped_not_found,
        "writtenTypes": written_types,
        "highlight": report.highlight,
        "failures": report.failures,
        "revision": wb.revision(),
        "appliedAt": chrono::Utc::now().to_rfc3339(),
    }))
}

fn preview_cancel(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let batch_id = get_required_str(&req.params, "batchId")?;
    state
        .previews
        .remove(&batch_id)
        .ok_or_else(|| batch_not_found(&batch_id))?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "preview.create" => preview_create(state, req),
        "preview.get" => preview_get(state, req),
        "preview.update" => preview_update(state, req),
        "preview.apply" => preview_apply(state, req),
        "preview.cancel" => preview_cancel(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
