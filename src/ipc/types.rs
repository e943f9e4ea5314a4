use std::path::PathBuf;

use serde::Deserialize;

use crate::import::ImportPreview;
use crate::registry::Registry;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    /// Selected workspace; without one the registry lives in memory only.
    pub workspace: Option<PathBuf>,
    pub registry: Registry,
    /// Parsed import waiting for `import.apply` or `import.cancel`.
    pub pending_import: Option<ImportPreview>,
}

impl AppState {
    pub fn new(registry: Registry) -> Self {
        AppState {
            workspace: None,
            registry,
            pending_import: None,
        }
    }
}
