//! Bulk import: decode bytes, sniff the format, parse raw rows and map them
//! onto typed records. Nothing in here touches the registry; callers merge the
//! resulting [`ImportPreview`] once the user confirms it.

pub mod census;
pub mod delimited;
pub mod json;
pub mod mapper;

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::backup::{self, BundleError};
use crate::config::MunicipalitySetup;
use crate::model::{School, Student};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file is empty")]
    Empty,
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("JSON document has no schools or students")]
    UnrecognizedJson,
    #[error("no {0} rows found")]
    NoRows(&'static str),
    #[error("no students found in census export")]
    NoCensusStudents,
    #[error("invalid backup bundle: {0}")]
    Bundle(#[from] BundleError),
}

impl ImportError {
    /// Stable error code for the IPC envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::Bundle(_) => "bundle_invalid",
            _ => "unparseable_input",
        }
    }
}

/// One untyped record keyed by normalized column name. Only the parsers
/// produce these and only the mapper consumes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow(BTreeMap<String, String>);

impl RawRow {
    pub fn insert(&mut self, key: String, value: String) {
        self.0.insert(key, value);
    }

    /// First synonym carrying a non-blank value.
    pub fn first(&self, synonyms: &[&str]) -> Option<&str> {
        synonyms
            .iter()
            .filter_map(|k| self.0.get(*k))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn has_any_value(&self) -> bool {
        self.0.values().any(|v| !v.trim().is_empty())
    }
}

/// Columns that only a school listing carries.
const SCHOOL_KEYS: &[&str] = &[
    "lat",
    "latitude",
    "lng",
    "longitude",
    "capacidade",
    "vagas",
    "availableslots",
    "endereco",
    "address",
    "tipo",
    "types",
    "modalidade",
    "inep",
];

/// Columns that rule out a school listing even when a school key shows up
/// (student records may carry coordinates).
const STUDENT_KEYS: &[&str] = &[
    "cpf",
    "birthdate",
    "nascimento",
    "datadenascimento",
    "dtnasc",
    "turma",
    "classname",
    "enrollmentid",
    "protocolo",
    "status",
    "situacao",
    "nomedoaluno",
    "aluno",
];

pub(crate) fn looks_like_school(row: &RawRow) -> bool {
    let keys: Vec<&str> = row.keys().collect();
    keys.iter().any(|k| SCHOOL_KEYS.contains(k)) && !keys.iter().any(|k| STUDENT_KEYS.contains(k))
}

/// Parser output before mapping.
#[derive(Debug)]
pub enum ParsedImport {
    Backup(backup::RegistryDocument),
    SchoolRows(Vec<RawRow>),
    StudentRows(Vec<RawRow>),
    Census(census::CensusExport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportKind {
    Backup,
    Schools,
    Students,
    Census,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub kind: ImportKind,
    pub file_name: String,
    pub schools: Vec<School>,
    pub students: Vec<Student>,
    pub warnings: Vec<String>,
}

impl ImportPreview {
    pub fn record_count(&self) -> usize {
        self.schools.len() + self.students.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportStage {
    Decoding { bytes: usize },
    Parsing { format: &'static str },
    Mapping { rows: usize },
    Ready { records: usize },
}

/// What the mapper needs to know about the registry it is importing into.
pub struct ImportContext<'a> {
    pub existing_schools: &'a [School],
    pub setup: &'a MunicipalitySetup,
}

/// File bytes as text: UTF-8 when valid, otherwise ISO-8859-1 (census
/// exports are Latin-1). A leading byte-order mark is dropped.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    };
    match text.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

fn extension(file_name: &str) -> String {
    std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Classifies `text` and runs the matching parser.
pub fn sniff(text: &str, file_name: &str) -> Result<ParsedImport, ImportError> {
    if text.trim().is_empty() {
        return Err(ImportError::Empty);
    }
    let ext = extension(file_name);
    if ext != "json" && census::looks_like_census(text) {
        let export = census::parse_census(text);
        if export.students.is_empty() {
            return Err(ImportError::NoCensusStudents);
        }
        return Ok(ParsedImport::Census(export));
    }

    let trimmed = text.trim_start();
    let json_like = trimmed.starts_with('{') || trimmed.starts_with('[');
    match ext.as_str() {
        "json" => json::parse_json(text),
        "csv" | "txt" => delimited_import(text),
        _ if json_like => json::parse_json(text),
        other => Err(ImportError::UnsupportedFormat(if other.is_empty() {
            file_name.to_string()
        } else {
            format!(".{other}")
        })),
    }
}

fn delimited_import(text: &str) -> Result<ParsedImport, ImportError> {
    let rows = delimited::parse_delimited(text);
    let Some(first) = rows.first() else {
        return Err(ImportError::NoRows("delimited"));
    };
    if looks_like_school(first) {
        Ok(ParsedImport::SchoolRows(rows))
    } else {
        Ok(ParsedImport::StudentRows(rows))
    }
}

/// Full import task: bytes in, preview or structured failure out. Progress is
/// reported through `observe`; the registry is never touched.
pub fn run_import(
    bytes: &[u8],
    file_name: &str,
    ctx: &ImportContext<'_>,
    observe: &mut dyn FnMut(&ImportStage),
) -> Result<ImportPreview, ImportError> {
    observe(&ImportStage::Decoding { bytes: bytes.len() });
    if bytes.is_empty() {
        return Err(ImportError::Empty);
    }

    let parsed = if backup::is_zip_bytes(bytes) {
        observe(&ImportStage::Parsing { format: "bundle" });
        ParsedImport::Backup(backup::read_bundle_bytes(bytes)?)
    } else {
        let text = decode_text(bytes);
        let parsed = sniff(&text, file_name)?;
        observe(&ImportStage::Parsing {
            format: match &parsed {
                ParsedImport::Backup(_) => "backup",
                ParsedImport::SchoolRows(_) | ParsedImport::StudentRows(_) => "rows",
                ParsedImport::Census(_) => "census",
            },
        });
        parsed
    };

    let preview = map_parsed(parsed, file_name, ctx, observe)?;
    info!(
        file = file_name,
        kind = ?preview.kind,
        schools = preview.schools.len(),
        students = preview.students.len(),
        "import preview ready"
    );
    observe(&ImportStage::Ready {
        records: preview.record_count(),
    });
    Ok(preview)
}

fn map_parsed(
    parsed: ParsedImport,
    file_name: &str,
    ctx: &ImportContext<'_>,
    observe: &mut dyn FnMut(&ImportStage),
) -> Result<ImportPreview, ImportError> {
    let mut warnings = Vec::new();
    let (kind, schools, students) = match parsed {
        ParsedImport::Backup(doc) => {
            let schools: Vec<School> = doc
                .schools
                .unwrap_or_default()
                .into_iter()
                .map(School::normalized)
                .collect();
            let students: Vec<Student> = doc
                .students
                .unwrap_or_default()
                .into_iter()
                .map(mapper::complete_student)
                .collect();
            observe(&ImportStage::Mapping {
                rows: schools.len() + students.len(),
            });
            (ImportKind::Backup, schools, students)
        }
        ParsedImport::SchoolRows(rows) => {
            observe(&ImportStage::Mapping { rows: rows.len() });
            let schools = rows
                .iter()
                .map(|r| mapper::map_school(r, ctx.setup))
                .collect();
            (ImportKind::Schools, schools, Vec::new())
        }
        ParsedImport::StudentRows(rows) => {
            observe(&ImportStage::Mapping { rows: rows.len() });
            let students = rows.iter().map(mapper::map_student).collect();
            (ImportKind::Students, Vec::new(), students)
        }
        ParsedImport::Census(export) => {
            observe(&ImportStage::Mapping {
                rows: export.students.len(),
            });
            if export.skipped_rows > 0 {
                debug!(skipped = export.skipped_rows, "census rows without id or name");
                warnings.push(format!(
                    "{} linhas sem identificação ou nome foram ignoradas",
                    export.skipped_rows
                ));
            }
            let school = mapper::census_school(&export, ctx);
            if school.is_none() {
                warnings.push(format!("escola \"{}\" já cadastrada", export.school_name));
            }
            (
                ImportKind::Census,
                school.into_iter().collect(),
                export.students,
            )
        }
    };

    if schools.is_empty() && students.is_empty() {
        return Err(ImportError::NoRows("backup"));
    }
    Ok(ImportPreview {
        kind,
        file_name: file_name.to_string(),
        schools,
        students,
        warnings,
    })
}
