use serde_json::{json, Value};

use crate::enrollment::ValidationError;
use crate::import::ImportError;
use crate::registry::RegistryError;

pub fn ok(id: &str, result: Value) -> Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(id: &str, code: &str, message: impl Into<String>, details: Option<Value>) -> Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// A failed handler, carried until it is rendered into the envelope.
#[derive(Debug)]
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<RegistryError> for HandlerErr {
    fn from(e: RegistryError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

impl From<ImportError> for HandlerErr {
    fn from(e: ImportError) -> Self {
        HandlerErr::new(e.code(), e.to_string())
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(e: ValidationError) -> Self {
        let details = json!({ "fields": e.fields });
        HandlerErr::new("validation_failed", e.to_string()).with_details(details)
    }
}

/// Renders a handler outcome.
pub fn reply(id: &str, outcome: Result<Value, HandlerErr>) -> Value {
    match outcome {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}
