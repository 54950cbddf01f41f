//! Attachment storage and download endpoints

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::path::Path as FsPath;
use std::sync::Arc;
use teamhub_config::UploadConfig;
use teamhub_database::{now_timestamp, Attachment};
use tracing::{debug, info};

use crate::error::{ErrorResponse, GatewayError, GatewayResult};
use crate::state::GatewayState;

/// Prefix of every attachment download URL.
pub const DOWNLOAD_PREFIX: &str = "/api/chats/download";

/// Slack on top of the upload limit for the multipart envelope.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Request body limit for routes that accept uploads.
pub fn body_limit(uploads: &UploadConfig) -> usize {
    usize::try_from(uploads.max_file_size_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD_BYTES)
}

/// Write an uploaded file under a fresh name and describe it.
pub async fn store_upload(
    uploads: &UploadConfig,
    original_name: &str,
    mimetype: &str,
    bytes: &[u8],
) -> GatewayResult<Attachment> {
    let filename = FsPath::new(original_name)
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("Uploaded file has no name".to_string()))?;

    if !uploads.is_extension_allowed(filename) {
        return Err(GatewayError::BadRequest(format!(
            "File type not allowed: {filename}"
        )));
    }

    let size = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    if size > uploads.max_file_size_bytes {
        return Err(GatewayError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            uploads.max_file_size_bytes
        )));
    }

    let extension = FsPath::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let stored_name = format!("{}.{extension}", cuid2::create_id());

    tokio::fs::create_dir_all(&uploads.dir).await?;
    let path = FsPath::new(&uploads.dir).join(&stored_name);
    tokio::fs::write(&path, bytes).await?;

    info!(stored_name = %stored_name, size, "stored upload");
    Ok(Attachment {
        filename: filename.to_string(),
        path: path.to_string_lossy().into_owned(),
        mimetype: mimetype.to_string(),
        size: i64::try_from(size).unwrap_or(i64::MAX),
        download_url: format!("{DOWNLOAD_PREFIX}/{stored_name}"),
        upload_date: now_timestamp(),
    })
}

/// Stored names are flat; anything that could walk the filesystem is refused.
fn is_safe_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
}

#[utoipa::path(
    get,
    path = "/api/chats/download/{filename}",
    tag = "Attachments",
    params(
        ("filename" = String, Path, description = "Stored attachment name")
    ),
    responses(
        (status = 200, description = "Attachment bytes", content_type = "application/octet-stream"),
        (status = 400, description = "Invalid file name", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
pub async fn download_attachment(
    Path(filename): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> GatewayResult<Response> {
    if !is_safe_name(&filename) {
        return Err(GatewayError::BadRequest("Invalid file name".to_string()));
    }

    let path = FsPath::new(&state.uploads.dir).join(&filename);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
            debug!(filename = %filename, "attachment missing");
            return Err(GatewayError::NotFound("File not found".to_string()));
        }
        Err(error) => return Err(error.into()),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn uploads(dir: &TempDir, max: u64) -> UploadConfig {
        UploadConfig {
            dir: dir.path().display().to_string(),
            max_file_size_bytes: max,
            ..UploadConfig::default()
        }
    }

    #[tokio::test]
    async fn test_store_upload_renames_and_describes() {
        let dir = TempDir::new().unwrap();
        let config = uploads(&dir, 1024);

        let attachment = store_upload(&config, "Q3 Report.PDF", "application/pdf", b"%PDF")
            .await
            .unwrap();

        assert_eq!(attachment.filename, "Q3 Report.PDF");
        assert_eq!(attachment.size, 4);
        assert!(attachment.download_url.starts_with("/api/chats/download/"));
        assert!(attachment.download_url.ends_with(".pdf"));
        let stored = attachment.download_url.rsplit('/').next().unwrap();
        assert!(dir.path().join(stored).exists());
    }

    #[tokio::test]
    async fn test_store_upload_rejects_type_and_size() {
        let dir = TempDir::new().unwrap();
        let config = uploads(&dir, 3);

        let error = store_upload(&config, "run.exe", "application/octet-stream", b"MZ")
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let error = store_upload(&config, "notes.txt", "text/plain", b"four")
            .await
            .unwrap_err();
        assert_eq!(error.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_download_names_are_flat() {
        assert!(is_safe_name("abc123.pdf"));
        assert!(!is_safe_name("../secrets.txt"));
        assert!(!is_safe_name("nested/file.txt"));
        assert!(!is_safe_name("nested\\file.txt"));
        assert!(!is_safe_name(""));
    }
}
