use crate::import::{run_import, ImportContext, ImportStage};
use crate::ipc::error::{ok, reply, HandlerErr};
use crate::ipc::helpers::{get_optional_path, get_optional_str, to_value};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use tracing::info;

fn stage_value(stage: &ImportStage) -> Value {
    match stage {
        ImportStage::Decoding { bytes } => json!({ "stage": "decoding", "bytes": bytes }),
        ImportStage::Parsing { format } => json!({ "stage": "parsing", "format": format }),
        ImportStage::Mapping { rows } => json!({ "stage": "mapping", "rows": rows }),
        ImportStage::Ready { records } => json!({ "stage": "ready", "records": records }),
    }
}

/// Source bytes and display name: either `path` on disk or inline
/// `fileName` + `content` text.
fn import_source(params: &Value) -> Result<(Vec<u8>, String), HandlerErr> {
    if let Some(path) = get_optional_path(params, "path") {
        let bytes = std::fs::read(&path).map_err(|e| {
            HandlerErr::bad_params(format!("failed to read {}: {}", path.display(), e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        return Ok((bytes, name));
    }
    let Some(content) = get_optional_str(params, "content") else {
        return Err(HandlerErr::bad_params("missing path or content"));
    };
    let name = get_optional_str(params, "fileName").unwrap_or_default();
    Ok((content.as_bytes().to_vec(), name.to_string()))
}

fn import_preview(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let (bytes, file_name) = import_source(&req.params)?;
    let ctx = ImportContext {
        existing_schools: state.registry.schools(),
        setup: state.registry.setup(),
    };
    let mut stages = Vec::new();
    let mut observe = |s: &ImportStage| stages.push(stage_value(s));
    let outcome = run_import(&bytes, &file_name, &ctx, &mut observe);
    let preview = match outcome {
        Ok(p) => p,
        Err(e) => {
            // A failed preview drops whatever was pending.
            state.pending_import = None;
            return Err(HandlerErr::from(e).with_details(json!({ "stages": stages })));
        }
    };
    let value = to_value(&preview)?;
    state.pending_import = Some(preview);
    Ok(json!({ "preview": value, "stages": stages }))
}

fn import_apply(state: &mut AppState) -> Result<Value, HandlerErr> {
    let Some(preview) = state.pending_import.take() else {
        return Err(HandlerErr::new("no_pending_import", "no import awaiting confirmation"));
    };
    let kind = preview.kind;
    match state.registry.apply_import(preview.clone()) {
        Ok(summary) => Ok(json!({ "kind": kind, "summary": to_value(&summary)? })),
        Err(e) => {
            // Persistence failed; keep the preview so the user can retry.
            state.pending_import = Some(preview);
            Err(e.into())
        }
    }
}

fn handle_import_cancel(state: &mut AppState, req: &Request) -> Value {
    let discarded = state.pending_import.take();
    if let Some(p) = &discarded {
        info!(file = %p.file_name, "import discarded");
    }
    ok(&req.id, json!({ "discarded": discarded.is_some() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "import.preview" => import_preview(state, req),
        "import.apply" => import_apply(state),
        "import.cancel" => return Some(handle_import_cancel(state, req)),
        _ => return None,
    };
    Some(reply(&req.id, outcome))
}
