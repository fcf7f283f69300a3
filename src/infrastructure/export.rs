use crate::domain::csv::Dataset;
use crate::domain::error::{AppError, Result};
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const CSV_CONTENT_TYPE: &str = "text/csv;charset=utf-8;";
pub const DEFAULT_EXPORT_FILE_NAME: &str = "predictions.csv";

fn io_err(msg: impl Into<String>) -> AppError {
    AppError::IoError(msg.into())
}

/// Server-rendered CSV packaged for download. The content is never rewritten.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ResultExporter {
    file_name: String,
}

impl Default for ResultExporter {
    fn default() -> Self {
        Self::new(DEFAULT_EXPORT_FILE_NAME)
    }
}

impl ResultExporter {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// `None` when the server produced no CSV; nothing is offered then.
    pub fn artifact(&self, csv: Option<&str>) -> Option<ExportArtifact> {
        let csv = csv.filter(|csv| !csv.is_empty())?;
        Some(ExportArtifact {
            file_name: self.file_name.clone(),
            content_type: CSV_CONTENT_TYPE,
            bytes: csv.as_bytes().to_vec(),
        })
    }

    /// Write the artifact into `dir` under its file name, replacing any
    /// earlier export.
    pub fn save_to(&self, artifact: &ExportArtifact, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&artifact.file_name);
        atomic_write_bytes(&path, &artifact.bytes)?;
        Ok(path)
    }

    /// Render a local dataset as delimited text: header line, then one line
    /// per row, missing values left empty. Values are written verbatim.
    pub fn serialize_dataset(dataset: &Dataset, delimiter: char) -> String {
        let sep = delimiter.to_string();
        let mut out = dataset.headers.join(&sep);
        out.push('\n');

        for row in &dataset.rows {
            let line = row
                .fields
                .iter()
                .map(|field| field.value.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(&sep);
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| io_err(format!("Failed to create dir {}: {e}", parent.display())))?;
    }

    let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
    {
        let mut file = fs::File::create(&tmp_path).map_err(|e| {
            io_err(format!("Failed to create temp file {}: {e}", tmp_path.display()))
        })?;
        file.write_all(bytes)
            .map_err(|e| io_err(format!("Failed to write {}: {e}", tmp_path.display())))?;
        file.sync_all()
            .map_err(|e| io_err(format!("Failed to sync {}: {e}", tmp_path.display())))?;
    }

    // Windows cannot rename over an existing file.
    if path.exists() {
        fs::remove_file(path)
            .map_err(|e| io_err(format!("Failed to replace {}: {e}", path.display())))?;
    }
    fs::rename(&tmp_path, path).map_err(|e| {
        io_err(format!(
            "Failed to rename temp file {} to {}: {e}",
            tmp_path.display(),
            path.display()
        ))
    })
}
