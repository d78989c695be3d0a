use crate::config::DetectionPolicy;
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_setup_get(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "policy": state.policy }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let Some(patch) = req.params.get("patch") else {
        return Err(HandlerErr::bad_params("missing params.patch"));
    };
    let next = state.policy.patched(patch).map_err(HandlerErr::bad_params)?;
    log::info!("detection policy updated");
    state.policy = next;
    Ok(json!({ "policy": state.policy }))
}

fn handle_setup_reset(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    state.policy = DetectionPolicy::default();
    Ok(json!({ "policy": state.policy }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        "setup.reset" => handle_setup_reset(state, req),
        _ => return None,
    };
    Some(reply(&req.id, result))
}
