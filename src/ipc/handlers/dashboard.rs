use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::to_value;
use crate::ipc::types::{AppState, Request};
use crate::stats::dashboard;
use serde_json::{json, Value};

fn dashboard_stats(state: &mut AppState) -> Result<Value, HandlerErr> {
    let reg = &state.registry;
    let stats = dashboard(
        reg.schools(),
        reg.students(),
        reg.last_backup(),
        chrono::Utc::now(),
    );
    Ok(json!({
        "stats": to_value(&stats)?,
        "lastBackup": reg.last_backup(),
        "municipality": reg.setup().name,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "dashboard.stats" => Some(reply(&req.id, dashboard_stats(state))),
        _ => None,
    }
}
