//! Attachment storage
//!
//! Uploaded files are written under `upload_root/{athlete}/{date}/` with a
//! deterministic name `{prefix}_{YYYYmmdd_HHMMSS}.{ext}` (UTC). Stored paths
//! are returned relative to the upload root with `/` separators and are never
//! moved afterwards.
//!
//! Names have one-second resolution: a second upload for the same prefix in
//! the same namespace within one second replaces the first file.

pub mod fields;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::record::normalize_separators;
use crate::sanitize::{normalize_date, sanitize};
use crate::{Error, Result};

/// Timestamp layout embedded in stored filenames
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Extensions accepted for photo fields
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// Extensions accepted for the video field
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm"];

/// Photo or video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Photo,
    Video,
}

impl AttachmentKind {
    /// Whether `ext` (lowercase, no dot) is an allowed type for this kind
    pub fn allows(&self, ext: &str) -> bool {
        match self {
            AttachmentKind::Photo => IMAGE_EXTENSIONS.contains(&ext),
            AttachmentKind::Video => VIDEO_EXTENSIONS.contains(&ext),
        }
    }
}

/// One file received from the submitter
#[derive(Debug, Clone)]
pub struct Upload {
    /// Multipart field name
    pub field_name: String,
    /// Client-side filename, if the client sent one
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    /// An upload with no filename is an empty file input, not a file
    pub fn is_present(&self) -> bool {
        self.file_name.as_deref().is_some_and(|n| !n.trim().is_empty())
    }

    /// Lowercased, sanitized extension of the client filename ("" if none)
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .map(extension_of)
            .unwrap_or_default()
    }
}

/// Lowercased, sanitized extension of `file_name` ("" if none)
pub fn extension_of(file_name: &str) -> String {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| sanitize(ext))
        .unwrap_or_default()
}

/// Per-athlete, per-date storage folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    athlete: String,
    date: String,
}

impl Namespace {
    /// Build the namespace for a submission
    ///
    /// Fails when either component sanitizes to an empty token.
    pub fn new(athlete_name: &str, checkin_date: &str) -> Result<Self> {
        let athlete = sanitize(athlete_name);
        if athlete.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Client name '{}' contains no usable characters",
                athlete_name
            )));
        }

        let date = normalize_date(checkin_date);
        if date.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Check-in date '{}' contains no usable characters",
                checkin_date
            )));
        }

        Ok(Self { athlete, date })
    }

    pub fn athlete_token(&self) -> &str {
        &self.athlete
    }

    pub fn date_token(&self) -> &str {
        &self.date
    }

    /// `athlete/date`
    pub fn relative_path(&self) -> String {
        format!("{}/{}", self.athlete, self.date)
    }
}

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    /// Path relative to the upload root, `/`-separated
    pub relative_path: String,
    pub size: u64,
}

/// Writes uploaded files under the upload root
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    root: PathBuf,
}

impl AttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store `upload` under `namespace`, named after `prefix` and the current time
    ///
    /// Returns `Ok(None)` when no file was supplied.
    pub async fn store(
        &self,
        upload: Option<&Upload>,
        namespace: &Namespace,
        prefix: &str,
    ) -> Result<Option<StoredAttachment>> {
        self.store_at(upload, namespace, prefix, Utc::now()).await
    }

    /// [`store`](Self::store) with an explicit timestamp
    pub async fn store_at(
        &self,
        upload: Option<&Upload>,
        namespace: &Namespace,
        prefix: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<StoredAttachment>> {
        let Some(upload) = upload.filter(|u| u.is_present()) else {
            return Ok(None);
        };

        let filename = stored_filename(prefix, &upload.extension(), now);
        let dir = self
            .root
            .join(namespace.athlete_token())
            .join(namespace.date_token());

        // create_dir_all succeeds when the folders already exist
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&filename), &upload.bytes).await?;

        let relative_path = format!("{}/{}", namespace.relative_path(), filename);
        debug!(
            field = %upload.field_name,
            path = %relative_path,
            bytes = upload.bytes.len(),
            "Stored attachment"
        );

        Ok(Some(StoredAttachment {
            relative_path,
            size: upload.bytes.len() as u64,
        }))
    }

    /// Map a persisted relative path back to a file under the root
    ///
    /// Returns `None` for empty or absolute paths and for paths containing
    /// `..` or other non-plain components.
    pub fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let normalized = normalize_separators(relative);
        let trimmed = normalized.trim_start_matches("uploads/");
        if trimmed.is_empty() {
            return None;
        }

        let path = Path::new(trimmed);
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return None;
        }

        Some(self.root.join(path))
    }
}

/// `{prefix}_{timestamp}.{ext}`, each part passed through the sanitizer
///
/// With no extension the trailing dot is omitted.
pub fn stored_filename(prefix: &str, ext: &str, now: DateTime<Utc>) -> String {
    let stem = sanitize(&format!(
        "{}_{}",
        prefix,
        now.format(FILENAME_TIMESTAMP_FORMAT)
    ));
    let ext = sanitize(ext);

    if ext.is_empty() {
        stem
    } else {
        format!("{}.{}", stem, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 15, 0).unwrap()
    }

    fn upload(field: &str, name: Option<&str>, data: &'static [u8]) -> Upload {
        Upload {
            field_name: field.to_string(),
            file_name: name.map(str::to_string),
            bytes: Bytes::from_static(data),
        }
    }

    #[test]
    fn test_stored_filename() {
        assert_eq!(
            stored_filename("front_relaxed", "JPG", fixed_time()),
            "front_relaxed_20240115_101500.jpg"
        );
        assert_eq!(
            stored_filename("front_relaxed", "", fixed_time()),
            "front_relaxed_20240115_101500"
        );
        assert_eq!(
            stored_filename("../evil", "../sh", fixed_time()),
            "evil_20240115_101500.sh"
        );
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("IMG_0001.JPEG"), "jpeg");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("no_extension"), "");
        assert_eq!(extension_of("weird.j/p g"), "jp_g");
    }

    #[test]
    fn test_namespace() {
        let ns = Namespace::new("Jane Doe", "2024-01-15").unwrap();
        assert_eq!(ns.relative_path(), "jane_doe/20240115");
        assert!(Namespace::new("!!!", "2024-01-15").is_err());
        assert!(Namespace::new("Jane", "--").is_err());
    }

    #[test]
    fn test_allowed_extensions() {
        assert!(AttachmentKind::Photo.allows("jpg"));
        assert!(!AttachmentKind::Photo.allows("mp4"));
        assert!(AttachmentKind::Video.allows("mov"));
        assert!(!AttachmentKind::Video.allows("exe"));
    }

    #[tokio::test]
    async fn test_store_writes_file_and_is_idempotent_on_folders() {
        let dir = TempDir::new().unwrap();
        let store = AttachmentStore::new(dir.path());
        let ns = Namespace::new("Jane Doe", "2024-01-15").unwrap();

        let first = upload("pose_front_relaxed", Some("front.JPG"), b"jpeg-bytes");
        let stored = store
            .store_at(Some(&first), &ns, "front_relaxed", fixed_time())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.relative_path,
            "jane_doe/20240115/front_relaxed_20240115_101500.jpg"
        );
        assert_eq!(stored.size, 10);

        let on_disk = dir.path().join("jane_doe/20240115/front_relaxed_20240115_101500.jpg");
        assert_eq!(std::fs::read(&on_disk).unwrap(), b"jpeg-bytes");

        // Second write into the same namespace must not fail on existing folders
        let second = upload("pose_rear_relaxed", Some("rear.png"), b"png");
        let stored = store
            .store_at(Some(&second), &ns, "rear_relaxed", fixed_time())
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn test_same_second_same_prefix_overwrites() {
        let dir = TempDir::new().unwrap();
        let store = AttachmentStore::new(dir.path());
        let ns = Namespace::new("Jane", "2024-01-15").unwrap();

        let a = upload("bb_abs", Some("a.jpg"), b"first");
        let b = upload("bb_abs", Some("b.jpg"), b"second");
        let pa = store.store_at(Some(&a), &ns, "bb_abs", fixed_time()).await.unwrap().unwrap();
        let pb = store.store_at(Some(&b), &ns, "bb_abs", fixed_time()).await.unwrap().unwrap();

        assert_eq!(pa.relative_path, pb.relative_path);
        let on_disk = store.resolve(&pb.relative_path).unwrap();
        assert_eq!(std::fs::read(on_disk).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let store = AttachmentStore::new(dir.path());
        let ns = Namespace::new("Jane", "2024-01-15").unwrap();

        assert!(store.store(None, &ns, "bb_abs").await.unwrap().is_none());

        let empty_input = upload("bb_abs", Some(""), b"");
        assert!(store.store(Some(&empty_input), &ns, "bb_abs").await.unwrap().is_none());

        // Nothing was created
        assert!(!dir.path().join("jane").exists());
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = AttachmentStore::new("/data/uploads");
        assert_eq!(
            store.resolve("jane/20240115/a.jpg"),
            Some(PathBuf::from("/data/uploads/jane/20240115/a.jpg"))
        );
        assert_eq!(
            store.resolve("jane\\20240115\\a.jpg"),
            Some(PathBuf::from("/data/uploads/jane/20240115/a.jpg"))
        );
        assert_eq!(
            store.resolve("uploads/jane/20240115/a.jpg"),
            Some(PathBuf::from("/data/uploads/jane/20240115/a.jpg"))
        );
        assert!(store.resolve("../secret").is_none());
        assert!(store.resolve("jane/../../secret").is_none());
        assert!(store.resolve("/etc/passwd").is_none());
        assert!(store.resolve("").is_none());
    }
}
