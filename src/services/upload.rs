use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::utils::error::{AppError, AppResult};
use crate::utils::helpers::new_id;

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "gif", "bmp", "webp"];
const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub dir: PathBuf,
    pub max_bytes: u64,
}

impl UploadPolicy {
    pub fn new(dir: impl Into<PathBuf>, limit_mb: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: limit_mb * BYTES_PER_MB,
        }
    }
}

/// What the client told us about the file, checked before anything is written.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredFile {
    pub content_type: String,
    pub extension: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub url: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub file_name: String,
    pub size: u64,
}

/// Only the declared type and the extension are checked; content is not sniffed.
pub fn check_declared(content_type: Option<&str>, file_name: Option<&str>) -> AppResult<DeclaredFile> {
    let content_type = content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .filter(|m| m.type_() == mime::IMAGE)
        .ok_or_else(|| AppError::File("Only image uploads are allowed (image/*)".to_string()))?;

    let extension = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::File(format!(
                "File type not allowed. Supported: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

    Ok(DeclaredFile {
        content_type: content_type.essence_str().to_string(),
        extension,
    })
}

/// A file being written. Dropped before `commit`, it deletes itself, which
/// covers size violations, body errors and requests dropped mid-transfer.
struct PartialUpload {
    path: PathBuf,
    committed: bool,
}

impl PartialUpload {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PartialUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed partial upload {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove partial upload {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Streams `body` to `<dir>/<uuid>.<ext>`, giving up as soon as the byte count
/// passes the policy limit.
pub async fn store_stream<S, E>(
    policy: &UploadPolicy,
    declared: &DeclaredFile,
    mut body: S,
) -> AppResult<StoredFile>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    fs::create_dir_all(&policy.dir)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create upload directory: {}", e)))?;

    let file_name = format!("{}.{}", new_id(), declared.extension);
    let path = policy.dir.join(&file_name);

    let guard = PartialUpload::new(path.clone());
    let mut file = fs::File::create(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to create file: {}", e)))?;

    let mut size: u64 = 0;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| AppError::File(format!("Upload interrupted: {}", e)))?;
        size += chunk.len() as u64;

        if size > policy.max_bytes {
            return Err(AppError::File(format!(
                "File too large. Maximum allowed size is {} MB",
                policy.max_bytes / BYTES_PER_MB
            )));
        }

        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;
    }

    if size == 0 {
        return Err(AppError::File("No file uploaded".to_string()));
    }

    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("Failed to write file: {}", e)))?;
    drop(file);
    guard.commit();

    tracing::info!("Stored upload {} ({} bytes)", file_name, size);
    Ok(StoredFile { file_name, size })
}

pub fn public_url(base_url: &str, file_name: &str) -> String {
    format!("{}/uploads/{}", base_url.trim_end_matches('/'), file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn temp_policy(max_bytes: u64) -> UploadPolicy {
        UploadPolicy {
            dir: std::env::temp_dir().join(format!("huddle-upload-{}", new_id())),
            max_bytes,
        }
    }

    fn png() -> DeclaredFile {
        DeclaredFile {
            content_type: "image/png".to_string(),
            extension: "png".to_string(),
        }
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
    }

    #[test]
    fn test_check_declared() {
        let ok = check_declared(Some("image/png"), Some("Cat.JPG")).unwrap();
        assert_eq!(ok.extension, "jpg");
        assert_eq!(ok.content_type, "image/png");

        assert!(check_declared(Some("text/plain"), Some("a.png")).is_err());
        assert!(check_declared(Some("image/png"), Some("a.exe")).is_err());
        assert!(check_declared(Some("image/png"), Some("noext")).is_err());
        assert!(check_declared(None, Some("a.png")).is_err());
        assert!(check_declared(Some("not a mime"), Some("a.png")).is_err());
    }

    #[tokio::test]
    async fn test_store_within_limit() {
        let policy = temp_policy(16);
        let body = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"12345678")),
            Ok(Bytes::from_static(b"abcd")),
        ]);

        let stored = store_stream(&policy, &png(), body).await.unwrap();
        assert_eq!(stored.size, 12);
        assert!(stored.file_name.ends_with(".png"));
        assert_eq!(
            std::fs::read(policy.dir.join(&stored.file_name)).unwrap(),
            b"12345678abcd"
        );
    }

    #[tokio::test]
    async fn test_oversize_leaves_no_file() {
        let policy = temp_policy(8);
        let body = stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"12345")),
            Ok(Bytes::from_static(b"67890")),
        ]);

        let err = store_stream(&policy, &png(), body).await.unwrap_err();
        assert!(matches!(err, AppError::File(_)));
        assert_eq!(file_count(&policy.dir), 0);
    }

    #[tokio::test]
    async fn test_broken_body_leaves_no_file() {
        let policy = temp_policy(1024);
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ]);

        assert!(store_stream(&policy, &png(), body).await.is_err());
        assert_eq!(file_count(&policy.dir), 0);
    }

    #[tokio::test]
    async fn test_empty_body_rejected() {
        let policy = temp_policy(1024);
        let body = stream::iter(Vec::<Result<Bytes, std::io::Error>>::new());

        assert!(store_stream(&policy, &png(), body).await.is_err());
        assert_eq!(file_count(&policy.dir), 0);
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("http://host:5000/", "a.png"),
            "http://host:5000/uploads/a.png"
        );
    }
}
