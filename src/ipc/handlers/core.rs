use crate::db::SqliteSnapshotStore;
use crate::ipc::error::{err, ok, reply, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::registry::Registry;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "schools": state.registry.schools().len(),
            "students": state.registry.students().len(),
            "pendingImport": state.pending_import.is_some(),
        }),
    )
}

/// Opens (creating if needed) the workspace database and loads its registry.
pub fn select_workspace(state: &mut AppState, path: &Path) -> Result<(), HandlerErr> {
    let store = SqliteSnapshotStore::open(path)
        .map_err(|e| HandlerErr::new("persist_failed", format!("{e:#}")))?;
    let registry = Registry::open(Box::new(store))?;
    info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path.to_path_buf());
    state.registry = registry;
    state.pending_import = None;
    Ok(())
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let outcome = select_workspace(state, &path).map(|_| {
        json!({
            "workspacePath": path.to_string_lossy(),
            "schools": state.registry.schools().len(),
            "students": state.registry.students().len(),
        })
    });
    reply(&req.id, outcome)
}

fn handle_registry_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let outcome = state
        .registry
        .reset()
        .map_err(HandlerErr::from)
        .map(|_| {
            state.pending_import = None;
            json!({
                "schools": state.registry.schools().len(),
                "students": state.registry.students().len(),
                "lastBackup": state.registry.last_backup(),
            })
        });
    reply(&req.id, outcome)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "registry.reset" => Some(handle_registry_reset(state, req)),
        _ => None,
    }
}
