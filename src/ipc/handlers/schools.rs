use crate::fuzzy::parse_eq_filter;
use crate::ipc::error::{ok, reply, HandlerErr};
use crate::ipc::helpers::{get_optional_str, get_required_str, get_status_filter, to_value};
use crate::ipc::types::{AppState, Request};
use crate::model::{School, SchoolStage};
use crate::stats::{school_catalog, school_detail, CatalogSort, DetailFilter};
use serde_json::{json, Value};
use uuid::Uuid;

/// `params.school` as a record; a missing id is generated when `generate_id`.
fn school_param(params: &Value, generate_id: bool) -> Result<School, HandlerErr> {
    let Some(obj) = params.get("school").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("school must be an object"));
    };
    let mut obj = obj.clone();
    let has_id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty());
    if !has_id {
        if !generate_id {
            return Err(HandlerErr::bad_params("missing school.id"));
        }
        obj.insert(
            "id".into(),
            json!(format!("school_{}", Uuid::new_v4().simple())),
        );
    }
    serde_json::from_value(Value::Object(obj))
        .map_err(|e| HandlerErr::bad_params(format!("invalid school: {}", e)))
}

fn handle_schools_list(state: &mut AppState, req: &Request) -> Value {
    ok(&req.id, json!({ "schools": state.registry.schools() }))
}

fn schools_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let school = school_param(&req.params, true)?;
    let id = school.id.clone();
    state.registry.add_school(school)?;
    Ok(json!({ "school": state.registry.school(&id) }))
}

fn schools_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let school = school_param(&req.params, false)?;
    let id = school.id.clone();
    let relinked = state.registry.update_school(school)?;
    Ok(json!({ "school": state.registry.school(&id), "relinkedStudents": relinked }))
}

fn schools_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = get_required_str(&req.params, "schoolId")?;
    let removed = state.registry.remove_school(&id)?;
    Ok(json!({ "removed": removed.id }))
}

fn stage_filter(params: &Value) -> Result<Option<SchoolStage>, HandlerErr> {
    match parse_eq_filter(get_optional_str(params, "stage")) {
        None => Ok(None),
        Some(raw) => serde_json::from_value(json!(raw))
            .map(Some)
            .map_err(|e| HandlerErr::bad_params(format!("invalid stage: {}", e))),
    }
}

fn schools_catalog(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let sort = match get_optional_str(&req.params, "sortBy") {
        None => CatalogSort::Name,
        Some(s) => CatalogSort::parse(s)
            .ok_or_else(|| HandlerErr::bad_params(format!("unknown sortBy: {}", s)))?,
    };
    let stage = stage_filter(&req.params)?;
    let entries = school_catalog(
        state.registry.schools(),
        state.registry.students(),
        state.registry.setup(),
        get_optional_str(&req.params, "text").unwrap_or_default(),
        stage,
        sort,
    );
    Ok(json!({ "schools": to_value(&entries)? }))
}

fn schools_detail(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let id = get_required_str(&req.params, "schoolId")?;
    let Some(school) = state.registry.school(&id) else {
        return Err(HandlerErr::new("not_found", format!("school not found: {}", id)));
    };
    let filter = DetailFilter {
        text: get_optional_str(&req.params, "text").unwrap_or_default().to_string(),
        cpf: get_optional_str(&req.params, "cpf").unwrap_or_default().to_string(),
        status: get_status_filter(&req.params, "status")?,
        class_name: parse_eq_filter(get_optional_str(&req.params, "className")),
    };
    let detail = school_detail(school, state.registry.students(), &filter);
    to_value(&detail)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "schools.list" => return Some(handle_schools_list(state, req)),
        "schools.create" => schools_create(state, req),
        "schools.update" => schools_update(state, req),
        "schools.delete" => schools_delete(state, req),
        "schools.catalog" => schools_catalog(state, req),
        "schools.detail" => schools_detail(state, req),
        _ => return None,
    };
    Some(reply(&req.id, outcome))
}
