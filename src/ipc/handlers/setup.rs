use crate::config::MunicipalitySetup;
use crate::ipc::error::{ok, reply, HandlerErr};
use crate::ipc::helpers::to_value;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Map, Value};

fn handle_setup_get(state: &mut AppState, req: &Request) -> Value {
    ok(&req.id, json!({ "municipality": state.registry.setup() }))
}

/// Shallow merge of `patch` over the current setup; unknown keys are
/// rejected so typos do not silently vanish.
fn merge_setup_patch(
    current: &MunicipalitySetup,
    patch: &Map<String, Value>,
) -> Result<MunicipalitySetup, HandlerErr> {
    let mut merged = to_value(current)?;
    let Some(obj) = merged.as_object_mut() else {
        return Err(HandlerErr::new("bad_params", "setup must be an object"));
    };
    for (k, v) in patch {
        if !obj.contains_key(k) {
            return Err(HandlerErr::bad_params(format!("unknown setup field: {}", k)));
        }
        obj.insert(k.clone(), v.clone());
    }
    serde_json::from_value(merged).map_err(|e| HandlerErr::bad_params(format!("invalid setup: {}", e)))
}

fn setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };
    let next = merge_setup_patch(state.registry.setup(), patch)?;
    state.registry.update_setup(next)?;
    Ok(json!({ "municipality": state.registry.setup() }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Value {
    reply(&req.id, setup_update(state, req))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
