use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::{fs, io::AsyncWriteExt};

use crate::error::ApiError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
pub const EVALUATION_SUBDIR: &str = "evaluaciones";
pub const IMAGE_KINDS: [&str; 5] = ["Clínica", "Radiografía", "Ecografía", "Termografía", "Otro"];
pub const DEFAULT_IMAGE_KIND: &str = "Otro";

pub fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
}

/// Empty or missing kinds fall back to `Otro`; anything outside the list is rejected.
pub fn image_kind(raw: Option<&str>) -> Result<&'static str, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(DEFAULT_IMAGE_KIND),
        Some(kind) => IMAGE_KINDS
            .into_iter()
            .find(|k| *k == kind)
            .ok_or_else(|| {
                ApiError::validation(format!(
                    "tipo_imagen must be one of: {}",
                    IMAGE_KINDS.join(", ")
                ))
            }),
    }
}

/// Lowercased `.ext` from the client file name, if it is short and alphanumeric.
fn extension(original_name: Option<&str>) -> String {
    original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 8 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

pub fn stored_file_name(data: &[u8], original_name: Option<&str>, millis: i64) -> String {
    let digest = hex::encode(Sha256::digest(data));
    format!("image-{}-{millis}{}", &digest[..16], extension(original_name))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub path: PathBuf,
    pub url: String,
}

/// Writes an evaluation image under `<root>/evaluaciones/` and returns its public URL.
pub async fn store_evaluation_image(
    root: &Path,
    data: &[u8],
    original_name: Option<&str>,
) -> Result<StoredImage, ApiError> {
    if data.is_empty() {
        return Err(ApiError::validation("image file is empty"));
    }
    if data.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::validation("image exceeds the 5 MB limit"));
    }

    let dir = root.join(EVALUATION_SUBDIR);
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::Internal(format!("create upload dir: {e}")))?;

    let name = stored_file_name(data, original_name, Utc::now().timestamp_millis());
    let path = dir.join(&name);

    let mut file = fs::File::create(&path)
        .await
        .map_err(|e| ApiError::Internal(format!("create upload file: {e}")))?;
    file.write_all(data)
        .await
        .map_err(|e| ApiError::Internal(format!("write upload file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("flush upload file: {e}")))?;

    tracing::info!(file = %name, size_bytes = data.len(), "evaluation image stored");

    Ok(StoredImage {
        path,
        url: format!("/uploads/{EVALUATION_SUBDIR}/{name}"),
    })
}

/// Maps a stored `/uploads/evaluaciones/<file>` URL back to its path under
/// `root`. Anything else (external URLs, nested or dotted names) yields `None`.
pub fn stored_path_for_url(root: &Path, url: &str) -> Option<PathBuf> {
    let prefix = format!("/uploads/{EVALUATION_SUBDIR}/");
    let name = url.strip_prefix(&prefix)?;
    let plain = !name.is_empty()
        && !name.starts_with('.')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    plain.then(|| root.join(EVALUATION_SUBDIR).join(name))
}

/// Best effort: a missing or foreign file is logged, never an error.
pub async fn remove_stored_image(root: &Path, url: &str) {
    let Some(path) = stored_path_for_url(root, url) else {
        tracing::debug!(url, "image url is not a local upload; nothing to remove");
        return;
    };
    if let Err(e) = fs::remove_file(&path).await {
        tracing::warn!(path = %path.display(), error = %e, "stored image not removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_image_content_types() {
        assert!(is_image_content_type(Some("image/png")));
        assert!(is_image_content_type(Some("IMAGE/JPEG")));
        assert!(!is_image_content_type(Some("application/pdf")));
        assert!(!is_image_content_type(None));
    }

    #[test]
    fn image_kind_defaults_and_validates() {
        assert_eq!(image_kind(None).unwrap(), "Otro");
        assert_eq!(image_kind(Some("  ")).unwrap(), "Otro");
        assert_eq!(image_kind(Some("Termografía")).unwrap(), "Termografía");
        assert!(image_kind(Some("Selfie")).is_err());
    }

    #[test]
    fn file_name_is_content_addressed_with_safe_extension() {
        let name = stored_file_name(b"abc", Some("Foto.JPG"), 1_700_000_000_000);
        assert_eq!(name, "image-ba7816bf8f01cfea-1700000000000.jpg");

        let odd = stored_file_name(b"abc", Some("../../etc/passwd"), 1);
        assert_eq!(odd, "image-ba7816bf8f01cfea-1");
        let weird = stored_file_name(b"abc", Some("x.p/h"), 1);
        assert!(!weird.contains('/'));
    }

    #[tokio::test]
    async fn stores_under_evaluations_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let stored = store_evaluation_image(tmp.path(), b"\x89PNG....", Some("pie.png"))
            .await
            .unwrap();

        assert!(stored.url.starts_with("/uploads/evaluaciones/image-"));
        assert!(stored.url.ends_with(".png"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"\x89PNG....");
        assert!(stored.path.starts_with(tmp.path().join("evaluaciones")));
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(store_evaluation_image(tmp.path(), b"", None).await.is_err());
        let big = vec![0u8; MAX_IMAGE_BYTES + 1];
        assert!(store_evaluation_image(tmp.path(), &big, None).await.is_err());
    }

    #[test]
    fn only_local_upload_urls_map_to_paths() {
        let root = Path::new("/srv/uploads");
        assert_eq!(
            stored_path_for_url(root, "/uploads/evaluaciones/image-ab-1.png"),
            Some(PathBuf::from("/srv/uploads/evaluaciones/image-ab-1.png"))
        );
        assert_eq!(stored_path_for_url(root, "https://cdn.example.org/x.png"), None);
        assert_eq!(stored_path_for_url(root, "/uploads/evaluaciones/../secret"), None);
        assert_eq!(stored_path_for_url(root, "/uploads/evaluaciones/a/b.png"), None);
        assert_eq!(stored_path_for_url(root, "/uploads/evaluaciones/"), None);
    }

    #[tokio::test]
    async fn removing_a_stored_image_deletes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let stored = store_evaluation_image(dir.path(), b"\x89PNG fake", Some("pie.png"))
            .await
            .unwrap();
        assert!(stored.path.exists());

        remove_stored_image(dir.path(), &stored.url).await;
        assert!(!stored.path.exists());

        // second removal only logs
        remove_stored_image(dir.path(), &stored.url).await;
    }
}
