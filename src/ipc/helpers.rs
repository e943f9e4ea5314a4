use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::PathBuf;

use super::error::HandlerErr;
use crate::fuzzy::parse_eq_filter;
use crate::model::EnrollmentStatus;

pub const DEFAULT_USER: &str = "Administrador";

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

pub fn get_optional_path(params: &Value, key: &str) -> Option<PathBuf> {
    get_optional_str(params, key)
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

/// Optional status filter; `all`/`Todos` disables it, unknown labels are
/// rejected.
pub fn get_status_filter(
    params: &Value,
    key: &str,
) -> Result<Option<EnrollmentStatus>, HandlerErr> {
    let Some(raw) = parse_eq_filter(get_optional_str(params, key)) else {
        return Ok(None);
    };
    EnrollmentStatus::from_label(&raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown status: {}", raw)))
}

pub fn get_id_list(params: &Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(items) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params(format!("{} must be an array", key)));
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| HandlerErr::bad_params(format!("{} must contain strings", key)))
        })
        .collect()
}

/// Deserializes `params[key]` into `T`.
pub fn get_typed<T: DeserializeOwned>(params: &Value, key: &str) -> Result<T, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing {}", key)));
    };
    serde_json::from_value(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid {}: {}", key, e)))
}

/// Acting user for history entries.
pub fn user(params: &Value) -> String {
    get_optional_str(params, "user")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

pub fn to_value<T: serde::Serialize>(v: &T) -> Result<Value, HandlerErr> {
    serde_json::to_value(v).map_err(|e| HandlerErr::new("export_failed", e.to_string()))
}
