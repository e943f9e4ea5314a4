use crate::enrollment::{advance, rank_schools, submit, validate_step, EnrollmentForm};
use crate::ipc::error::{reply, HandlerErr};
use crate::ipc::helpers::{get_typed, to_value};
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use tracing::info;

/// `params.form`, or a fresh form for the current municipality when absent.
fn form_param(state: &AppState, params: &Value) -> Result<EnrollmentForm, HandlerErr> {
    if params.get("form").is_none() {
        return Ok(EnrollmentForm::new(state.registry.setup()));
    }
    get_typed(params, "form")
}

fn enrollment_validate_step(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let form = form_param(state, &req.params)?;
    let step = match req.params.get("step").and_then(|v| v.as_u64()) {
        Some(s) => u8::try_from(s).map_err(|_| HandlerErr::bad_params("step out of range"))?,
        None => form.step,
    };
    let errors = validate_step(&form, step);
    Ok(json!({ "step": step, "valid": errors.is_empty(), "errors": errors }))
}

fn enrollment_advance(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let form = form_param(state, &req.params)?;
    let next = advance(form, state.registry.setup())?;
    to_value(&next)
}

fn enrollment_rank_schools(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let p = &req.params;
    let origin = match (
        p.get("lat").and_then(|v| v.as_f64()),
        p.get("lng").and_then(|v| v.as_f64()),
    ) {
        (Some(lat), Some(lng)) => Some((lat, lng)),
        _ if p.get("form").is_some() => form_param(state, p)?.address.coordinates(),
        _ => None,
    };
    let ranked = rank_schools(state.registry.schools(), origin);
    Ok(json!({ "schools": to_value(&ranked)? }))
}

fn enrollment_submit(state: &mut AppState, req: &Request) -> Result<Value, HandlerErr> {
    let form = get_typed::<EnrollmentForm>(&req.params, "form")?;
    let student = submit(&form, state.registry.schools())?;
    let id = student.id.clone();
    let protocol = student.enrollment_id.clone();
    state
        .registry
        .add_student(student, form.guardian.full_name.trim())?;
    info!(protocol = %protocol, "enrollment request submitted");
    Ok(json!({
        "protocol": protocol,
        "student": state.registry.student(&id),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "enrollment.validateStep" => enrollment_validate_step(state, req),
        "enrollment.advance" => enrollment_advance(state, req),
        "enrollment.rankSchools" => enrollment_rank_schools(state, req),
        "enrollment.submit" => enrollment_submit(state, req),
        _ => return None,
    };
    Some(reply(&req.id, outcome))
}
