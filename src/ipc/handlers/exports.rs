use crate::backup;
use crate::export::{
    backup_json, class_roster_csv, class_summary_csv, roster_file_name, students_csv, write_file,
};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::handlers::students::matching_students;
use crate::ipc::helpers::{get_optional_path, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::stats::class_groups;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::info;

const BACKUP_DIR: &str = "backups";

fn export_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("export_failed", format!("{e:#}"))
}

/// Writes `contents` to `outPath` when given, otherwise hands the text back.
fn deliver(params: &Value, file_name: String, contents: String) -> Result<Value, HandlerErr> {
    match get_optional_path(params, "outPath") {
        Some(path) => {
            write_file(&path, &contents).map_err(export_failed)?;
            info!(path = %path.display(), "export written");
            Ok(json!({ "path": path.to_string_lossy(), "fileName": file_name }))
        }
        None => Ok(json!({ "fileName": file_name, "content": contents })),
    }
}

fn export_students_csv(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    // Same filters as students.search; no filters exports everyone.
    let hits = matching_students(state.registry.students(), &req.params)?;
    let count = hits.len();
    let mut out = deliver(
        &req.params,
        "alunos_export.csv".to_string(),
        students_csv(hits),
    )?;
    out["rows"] = json!(count);
    Ok(out)
}

fn export_class_roster_csv(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let school = get_required_str(&req.params, "school")?;
    let class_name = get_required_str(&req.params, "className")?;
    let Some(csv) = class_roster_csv(state.registry.students(), &school, &class_name) else {
        return Err(HandlerErr::new(
            "not_found",
            format!("no students in {} / {}", school, class_name),
        ));
    };
    deliver(&req.params, roster_file_name(&class_name), csv)
}

fn export_class_summary_csv(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let groups = class_groups(state.registry.students());
    let mut out = deliver(
        &req.params,
        "resumo_turmas.csv".to_string(),
        class_summary_csv(&groups),
    )?;
    out["classes"] = json!(groups.len());
    Ok(out)
}

fn export_backup_json(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let text = backup_json(&state.registry.backup_document()).map_err(export_failed)?;
    let stamp = chrono::Local::now().format("%Y-%m-%d");
    let mut out = deliver(&req.params, format!("backup_educa_{stamp}.json"), text)?;
    out["lastBackup"] = json!(state.registry.register_backup()?);
    Ok(out)
}

fn default_bundle_path(state: &AppState) -> Result<PathBuf, HandlerErr> {
    let Some(workspace) = state.workspace.as_ref() else {
        return Err(HandlerErr::new(
            "no_workspace",
            "outPath is required when no workspace is selected",
        ));
    };
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(workspace
        .join(BACKUP_DIR)
        .join(format!("educa-backup-{stamp}.zip")))
}

fn backup_export_bundle(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let out_path = match get_optional_path(&req.params, "outPath") {
        Some(p) => p,
        None => default_bundle_path(state)?,
    };
    let summary = backup::export_registry_bundle(&state.registry.backup_document(), &out_path)
        .map_err(|e| {
            export_failed(e).with_details(json!({ "path": out_path.to_string_lossy() }))
        })?;
    let last_backup = state.registry.register_backup()?;
    info!(path = %out_path.display(), "backup bundle exported");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "sha256": summary.sha256,
        "lastBackup": last_backup,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "export.studentsCsv" => export_students_csv(state, req),
        "export.classRosterCsv" => export_class_roster_csv(state, req),
        "export.classSummaryCsv" => export_class_summary_csv(state, req),
        "export.backupJson" => export_backup_json(state, req),
        "backup.exportBundle" => backup_export_bundle(state, req),
        _ => return None,
    };
    Some(reply(&req.id, outcome))
}
