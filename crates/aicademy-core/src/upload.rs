use std::fmt;
use std::path::Path;

use crate::config::Config;
use crate::error::WorkflowError;

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf"];

/// A source file picked by the user, held in memory until it is parsed
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> Result<Self, WorkflowError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                WorkflowError::InvalidUpload(format!("{} is not a file", path.display()))
            })?;
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            WorkflowError::InvalidUpload(format!("Could not read {}: {}", path.display(), e))
        })?;
        Ok(Self { name, bytes })
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("name", &self.name)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Check file count, type and size before anything is sent to the parser
pub fn validate_uploads(files: &[UploadFile], config: &Config) -> Result<(), WorkflowError> {
    if files.is_empty() {
        return Err(WorkflowError::InvalidUpload(
            "Add at least one PDF to continue.".to_string(),
        ));
    }

    if files.len() > config.max_files {
        return Err(WorkflowError::InvalidUpload(format!(
            "You can upload at most {} files.",
            config.max_files
        )));
    }

    let max_bytes = config.max_file_size_mb.saturating_mul(1024 * 1024);
    for file in files {
        let allowed = file
            .extension()
            .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
            .unwrap_or(false);
        if !allowed {
            return Err(WorkflowError::InvalidUpload(format!(
                "{} is not a PDF file.",
                file.name
            )));
        }

        if file.size() > max_bytes {
            return Err(WorkflowError::InvalidUpload(format!(
                "{} exceeds the {} MB limit.",
                file.name, config.max_file_size_mb
            )));
        }
    }

    Ok(())
}
