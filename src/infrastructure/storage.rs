//! Media storage for uploaded files.
//!
//! Files land in `<media_root>/<kind dir>/<uuid>.<ext>` and are served under `/media`.

use std::path::{Path, PathBuf};

use crate::domain::DomainError;

const MIB: usize = 1024 * 1024;

const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
const PDF_EXTENSIONS: &[&str] = &["pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    AbstractDocument,
    ConferenceBanner,
    EbookletCover,
    EbookletFile,
}

impl UploadKind {
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            UploadKind::AbstractDocument => DOCUMENT_EXTENSIONS,
            UploadKind::ConferenceBanner | UploadKind::EbookletCover => IMAGE_EXTENSIONS,
            UploadKind::EbookletFile => PDF_EXTENSIONS,
        }
    }

    pub fn max_bytes(self) -> usize {
        match self {
            UploadKind::AbstractDocument => 10 * MIB,
            UploadKind::ConferenceBanner | UploadKind::EbookletCover => 5 * MIB,
            UploadKind::EbookletFile => 50 * MIB,
        }
    }

    fn directory(self) -> &'static str {
        match self {
            UploadKind::AbstractDocument => "abstracts",
            UploadKind::ConferenceBanner => "conferences",
            UploadKind::EbookletCover => "ebooklets/covers",
            UploadKind::EbookletFile => "ebooklets/files",
        }
    }
}

/// Checks extension and size; returns the lower-cased extension.
pub fn validate_upload(kind: UploadKind, filename: &str, size: usize) -> Result<String, DomainError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let allowed = kind.allowed_extensions();
    if !allowed.contains(&extension.as_str()) {
        return Err(DomainError::field(
            "file",
            format!(
                "File extension \"{}\" is not allowed. Allowed extensions are: {}.",
                extension,
                allowed.join(", ")
            ),
        ));
    }

    if size == 0 {
        return Err(DomainError::field("file", "The submitted file is empty."));
    }

    if size > kind.max_bytes() {
        return Err(DomainError::field(
            "file",
            format!(
                "File size exceeds the {} MB limit.",
                kind.max_bytes() / MIB
            ),
        ));
    }

    Ok(extension)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub url: String,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
    base_url: String,
}

impl MediaStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates and writes the upload, returning its public URL.
    pub async fn save(
        &self,
        kind: UploadKind,
        filename: &str,
        data: &[u8],
    ) -> Result<StoredFile, DomainError> {
        let extension = validate_upload(kind, filename, data.len())?;

        let dir = self.root.join(kind.directory());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to create media dir: {}", e)))?;

        let name = format!("{}.{}", uuid::Uuid::new_v4(), extension);
        tokio::fs::write(dir.join(&name), data)
            .await
            .map_err(|e| DomainError::Internal(format!("Failed to save upload: {}", e)))?;

        tracing::debug!("Stored {:?} upload as {}/{}", kind, kind.directory(), name);

        Ok(StoredFile {
            url: format!("{}/media/{}/{}", self.base_url, kind.directory(), name),
            size: data.len() as i64,
        })
    }

    /// Best-effort removal of a file previously returned by [`save`](Self::save).
    pub async fn remove(&self, url: &str) {
        let Some((_, relative)) = url.split_once("/media/") else {
            return;
        };
        if relative.split('/').any(|part| part == "..") {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(self.root.join(relative)).await {
            tracing::debug!("Could not remove old upload {}: {}", relative, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_disallowed_extension() {
        let err = validate_upload(UploadKind::AbstractDocument, "slides.pptx", 10).unwrap_err();
        match err {
            DomainError::Validation(errors) => assert!(errors.contains("file")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert_eq!(
            validate_upload(UploadKind::ConferenceBanner, "Banner.JPG", 1024).unwrap(),
            "jpg"
        );
    }

    #[test]
    fn rejects_files_over_the_ceiling() {
        let limit = UploadKind::ConferenceBanner.max_bytes();
        assert!(validate_upload(UploadKind::ConferenceBanner, "a.png", limit).is_ok());
        assert!(validate_upload(UploadKind::ConferenceBanner, "a.png", limit + 1).is_err());
    }

    #[test]
    fn rejects_missing_extension_and_empty_files() {
        assert!(validate_upload(UploadKind::EbookletFile, "README", 10).is_err());
        assert!(validate_upload(UploadKind::EbookletFile, "book.pdf", 0).is_err());
    }

    #[tokio::test]
    async fn save_writes_under_kind_directory() {
        let root = std::env::temp_dir().join(format!("societyhub-media-{}", uuid::Uuid::new_v4()));
        let storage = MediaStorage::new(&root, "http://localhost:8000/");

        let stored = storage
            .save(UploadKind::AbstractDocument, "paper.PDF", b"%PDF-1.4")
            .await
            .unwrap();
        assert!(stored.url.starts_with("http://localhost:8000/media/abstracts/"));
        assert!(stored.url.ends_with(".pdf"));
        assert_eq!(stored.size, 8);

        let relative = stored.url.split_once("/media/").unwrap().1;
        assert!(root.join(relative).exists());

        storage.remove(&stored.url).await;
        assert!(!root.join(relative).exists());
        let _ = std::fs::remove_dir_all(root);
    }
}
