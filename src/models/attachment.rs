use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Reference to a file registered with the assistant backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub filename: String,
    pub file_id: String,
}

/// A file picked by the visitor, read lazily when it is encoded.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub path: PathBuf,
}

impl UploadedFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { filename, path }
    }
}
