use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::model::DEFAULT_SCHOOL_IMAGE;

pub const ENV_WORKSPACE: &str = "EDUCAD_WORKSPACE";
pub const ENV_LOG: &str = "EDUCAD_LOG";
pub const ENV_LOG_FORMAT: &str = "EDUCAD_LOG_FORMAT";

/// Settings key of the municipality setup blob.
pub const SETUP_KEY: &str = "setup.municipality";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Process-level settings, read once at startup.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub workspace: Option<PathBuf>,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |k: &str| get(k).filter(|v| !v.trim().is_empty());
        DaemonConfig {
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
            log_filter: non_empty(ENV_LOG).unwrap_or_else(|| "info".to_string()),
            log_format: match non_empty(ENV_LOG_FORMAT).as_deref() {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }
}

/// The municipality the registry serves. Stored per workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MunicipalitySetup {
    pub name: String,
    pub state_code: String,
    pub center_lat: f64,
    pub center_lng: f64,
    pub default_school_image: String,
}

impl Default for MunicipalitySetup {
    fn default() -> Self {
        MunicipalitySetup {
            name: "Itaberaba".to_string(),
            state_code: "BA".to_string(),
            center_lat: -12.5260,
            center_lng: -40.2930,
            default_school_image: DEFAULT_SCHOOL_IMAGE.to_string(),
        }
    }
}
