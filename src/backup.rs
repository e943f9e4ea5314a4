use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::model::{School, Student};

const MANIFEST_ENTRY: &str = "manifest.json";
const REGISTRY_ENTRY: &str = "registry.json";
pub const BUNDLE_FORMAT: &str = "educa-registry-v1";

const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// `{students, schools}` as written by the JSON backup and read back by
/// imports. Either half may be missing on input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<Student>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schools: Option<Vec<School>>,
}

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("failed to read bundle entry: {0}")]
    Io(#[from] std::io::Error),
    #[error("bundle missing {0}")]
    MissingEntry(&'static str),
    #[error("{entry} is invalid JSON: {source}")]
    Json {
        entry: &'static str,
        source: serde_json::Error,
    },
    #[error("unsupported bundle format: {0}")]
    UnsupportedFormat(String),
    #[error("checksum mismatch for registry.json")]
    ChecksumMismatch,
}

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn export_registry_bundle(
    doc: &RegistryDocument,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let registry = serde_json::to_vec_pretty(doc).context("failed to serialize registry")?;
    let checksum = sha256_hex(&registry);

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Local::now().to_rfc3339(),
        "sha256": checksum,
        "students": doc.students.as_ref().map_or(0, Vec::len),
        "schools": doc.schools.as_ref().map_or(0, Vec::len),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(REGISTRY_ENTRY, opts)
        .context("failed to start registry entry")?;
    zip.write_all(&registry)
        .context("failed to write registry entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: 2,
        sha256: checksum,
    })
}

/// Reads a bundle held in memory, checking its format and the registry
/// checksum recorded in the manifest.
pub fn read_bundle_bytes(bytes: &[u8]) -> Result<RegistryDocument, BundleError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;

    let mut manifest_text = String::new();
    match archive.by_name(MANIFEST_ENTRY) {
        Ok(mut entry) => {
            entry.read_to_string(&mut manifest_text)?;
        }
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(BundleError::MissingEntry(MANIFEST_ENTRY))
        }
        Err(e) => return Err(e.into()),
    }
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).map_err(|source| BundleError::Json {
            entry: MANIFEST_ENTRY,
            source,
        })?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(BundleError::UnsupportedFormat(format.to_string()));
    }

    let mut registry = Vec::new();
    match archive.by_name(REGISTRY_ENTRY) {
        Ok(mut entry) => {
            entry.read_to_end(&mut registry)?;
        }
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(BundleError::MissingEntry(REGISTRY_ENTRY))
        }
        Err(e) => return Err(e.into()),
    }
    let expected = manifest
        .get("sha256")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if !expected.eq_ignore_ascii_case(&sha256_hex(&registry)) {
        return Err(BundleError::ChecksumMismatch);
    }

    serde_json::from_slice(&registry).map_err(|source| BundleError::Json {
        entry: REGISTRY_ENTRY,
        source,
    })
}

pub fn is_zip_bytes(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == ZIP_SIGNATURE
}
