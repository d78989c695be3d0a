use crate::catalog::{build_catalog, CatalogScope};
use crate::detect::{detect_roles, ColumnKind};
use crate::idlist::{parse_identifier_list, ListMode};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, workbook};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn list_mode(req: &Request) -> Result<ListMode, HandlerErr> {
    match get_optional_str(&req.params, "mode") {
        None => Ok(ListMode::Identifiers),
        Some(m) => ListMode::parse(&m)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown list mode: {m}"))),
    }
}

fn columns_detect(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let wb = workbook(state)?;
    let sheet = get_required_str(&req.params, "sheet")?;
    let targets = match req.params.get("text").and_then(|v| v.as_str()) {
        Some(text) => Some(
            parse_identifier_list(text, ListMode::Identifiers, state.policy.min_id_digits)?
                .target_ids,
        ),
        None => None,
    };
    let roles = detect_roles(wb, &sheet, targets.as_ref(), &state.policy).ok_or_else(|| {
        HandlerErr {
            code: "invalid_grid",
            message: format!("sheet '{sheet}' is missing or empty"),
            details: None,
        }
    })?;
    Ok(json!({ "roles": roles }))
}

fn columns_catalog(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let wb = workbook(state)?;
    let scope = match get_optional_str(&req.params, "sheet") {
        Some(sheet) => CatalogScope::Sheet(sheet),
        None => CatalogScope::AllSheets,
    };
    let kind = match get_optional_str(&req.params, "kind") {
        Some(k) => Some(
            ColumnKind::parse(&k)
                .ok_or_else(|| HandlerErr::bad_params(format!("unknown column kind: {k}")))?,
        ),
        None => None,
    };
    let mut options = build_catalog(wb, &scope, &state.policy)?;
    if let Some(kind) = kind {
        options.retain(|o| o.kind == kind);
    }
    Ok(json!({ "revision": wb.revision(), "options": options }))
}

fn ids_parse(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(text) = req.params.get("text").and_then(|v| v.as_str()) else {
        return Err(HandlerErr::bad_params("missing params.text"));
    };
    let mode = list_mode(req)?;
    let list = parse_identifier_list(text, mode, state.policy.min_id_digits)?;
    let duplicates: Vec<serde_json::Value> = list
        .duplicates()
        .into_iter()
        .map(|(id, count)| json!({ "id": id, "count": count }))
        .collect();
    let mut out = json!(list);
    out["duplicates"] = json!(duplicates);
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "columns.detect" => columns_detect(state, req),
        "columns.catalog" => columns_catalog(state, req),
        "ids.parse" => ids_parse(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
