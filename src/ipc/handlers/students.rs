use crate::fuzzy::{
    filter_students, paginate, parse_eq_filter, sort_students, SortDirection, StudentQuery,
    DEFAULT_PAGE_SIZE,
};
use crate::ipc::error::{ok, reply, HandlerErr};
use crate::ipc::helpers::{
    get_id_list, get_optional_str, get_required_str, get_status_filter, to_value, user,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{EnrollmentStatus, Student};
use crate::registry::ClassAssignment;
use crate::stats::class_groups;
use serde_json::{json, Value};
use uuid::Uuid;

/// Filter part of a search request: `query`, `school`, `status`,
/// `className`, where `all`/`Todas`/`Todos` disable a filter.
pub fn query_from_params(params: &Value) -> Result<StudentQuery, HandlerErr> {
    Ok(StudentQuery {
        text: get_optional_str(params, "query").unwrap_or_default().to_string(),
        school: parse_eq_filter(get_optional_str(params, "school")),
        status: get_status_filter(params, "status")?,
        class_name: parse_eq_filter(get_optional_str(params, "className")),
    })
}

/// Filtered and optionally sorted students.
pub fn matching_students<'a>(
    students: &'a [Student],
    params: &Value,
) -> Result<Vec<&'a Student>, HandlerErr> {
    let mut hits = filter_students(students, &query_from_params(params)?);
    if let Some(column) = get_optional_str(params, "sortBy") {
        let dir = match get_optional_str(params, "sortDir") {
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        };
        sort_students(&mut hits, column, dir);
    }
    Ok(hits)
}

fn student_param(params: &Value, generate_id: bool) -> Result<Student, HandlerErr> {
    let Some(obj) = params.get("student").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("student must be an object"));
    };
    let mut obj = obj.clone();
    let has_id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.trim().is_empty());
    if !has_id {
        if !generate_id {
            return Err(HandlerErr::bad_params("missing student.id"));
        }
        obj.insert(
            "id".into(),
            json!(format!("manual_{}", Uuid::new_v4().simple())),
        );
    }
    let student: Student = serde_json::from_value(Value::Object(obj))
        .map_err(|e| HandlerErr::bad_params(format!("invalid student: {}", e)))?;
    if student.name.trim().is_empty() {
        return Err(HandlerErr::bad_params("student.name is required"));
    }
    Ok(student)
}

fn handle_students_list(state: &mut AppState, req: &Request) -> Value {
    ok(&req.id, json!({ "students": state.registry.students() }))
}

fn students_search(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let hits = matching_students(state.registry.students(), &req.params)?;
    let page_number = req
        .params
        .get("page")
        .and_then(|v| v.as_u64())
        .unwrap_or(1) as usize;
    let page_size = req
        .params
        .get("pageSize")
        .and_then(|v| v.as_u64())
        .map_or(DEFAULT_PAGE_SIZE, |v| v as usize);
    let page = paginate(&hits, page_number, page_size);
    Ok(json!({
        "total": page.total,
        "page": page.page,
        "pageSize": page.page_size,
        "pageCount": page.page_count,
        "ids": hits.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
        "students": page.items,
    }))
}

fn students_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student = student_param(&req.params, true)?;
    let id = student.id.clone();
    state.registry.add_student(student, &user(&req.params))?;
    Ok(json!({ "student": state.registry.student(&id) }))
}

fn students_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let student = student_param(&req.params, false)?;
    let id = student.id.clone();
    state.registry.update_student(student, &user(&req.params))?;
    Ok(json!({ "student": state.registry.student(&id) }))
}

fn students_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ids = match get_optional_str(&req.params, "studentId") {
        Some(id) => vec![id.to_string()],
        None => get_id_list(&req.params, "studentIds")?,
    };
    let removed = state.registry.remove_students(&ids)?;
    Ok(json!({ "removed": removed }))
}

fn students_bulk_status(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ids = get_id_list(&req.params, "studentIds")?;
    let raw = get_required_str(&req.params, "status")?;
    let Some(status) = EnrollmentStatus::from_label(&raw) else {
        return Err(HandlerErr::bad_params(format!("unknown status: {}", raw)));
    };
    let updated = state
        .registry
        .bulk_set_status(&ids, status, &user(&req.params))?;
    Ok(json!({ "updated": updated }))
}

fn students_bulk_assign_class(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let ids = get_id_list(&req.params, "studentIds")?;
    let field = |k: &str| get_optional_str(&req.params, k).unwrap_or_default().to_string();
    let assignment = ClassAssignment {
        class_name: field("className"),
        grade: field("grade"),
        shift: field("shift"),
    };
    let updated = state
        .registry
        .bulk_assign_class(&ids, &assignment, &user(&req.params))?;
    Ok(json!({ "updated": updated }))
}

fn students_allocate(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let school_id = get_required_str(&req.params, "schoolId")?;
    let allocated = state
        .registry
        .allocate_unallocated(&school_id, &user(&req.params))?;
    Ok(json!({ "allocated": allocated }))
}

fn classes_groups(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let hits = filter_students(state.registry.students(), &query_from_params(&req.params)?);
    let groups = class_groups(hits);
    Ok(json!({ "classes": to_value(&groups)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "students.list" => return Some(handle_students_list(state, req)),
        "students.search" => students_search(state, req),
        "students.create" => students_create(state, req),
        "students.update" => students_update(state, req),
        "students.delete" => students_delete(state, req),
        "students.bulkStatus" => students_bulk_status(state, req),
        "students.bulkAssignClass" => students_bulk_assign_class(state, req),
        "students.allocate" => students_allocate(state, req),
        "classes.groups" => classes_groups(state, req),
        _ => return None,
    };
    Some(reply(&req.id, outcome))
}
