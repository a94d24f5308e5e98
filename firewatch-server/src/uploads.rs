// Multipart upload intake and scratch files

use crate::error::ApiError;
use axum::extract::Multipart;
use bytes::Bytes;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Name of the multipart field carrying the upload
pub const FILE_FIELD: &str = "file";

/// A file received through multipart, still in memory
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    /// Lowercase extension of the client file name, if it is a sane one
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name.as_deref()?;
        let ext = Path::new(name).extension()?.to_str()?;
        if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

/// Pull the `file` field out of a multipart body, ignoring other fields
pub async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(ApiError::from_multipart)?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let bytes = field.bytes().await.map_err(ApiError::from_multipart)?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }

        debug!(?file_name, size = bytes.len(), "Received upload");
        return Ok(UploadedFile { file_name, bytes });
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

/// Upload written to the scratch directory, deleted when dropped
#[derive(Debug)]
pub struct ScratchUpload {
    file: NamedTempFile,
}

impl ScratchUpload {
    /// Write the upload to a uniquely named file keeping its extension
    pub fn persist(upload: &UploadedFile, dir: &Path) -> Result<Self, ApiError> {
        let suffix = upload
            .extension()
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| ApiError::Internal(format!("Failed to create scratch file: {}", e)))?;
        file.write_all(&upload.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| ApiError::Internal(format!("Failed to write scratch file: {}", e)))?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
