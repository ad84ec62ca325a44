//! Document backend: `{athlete}_checkins.json` files holding JSON arrays

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{PersistenceGateway, QueryOutcome};
use crate::attachments::fields::{UPLOAD_FIELDS, VIDEO_FIELD};
use crate::config::BackendKind;
use crate::record::{normalize_separators, parse_timestamp, CheckinRecord};
use crate::sanitize::sanitize;
use crate::triage::classify;
use crate::{Error, Result};

const COLLECTION_SUFFIX: &str = "_checkins.json";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Per-athlete JSON collections stored next to the uploads
///
/// Appends rewrite the athlete's whole file through a temp file unique to
/// that append. Appends through one store (and its clones) are serialized;
/// two processes sharing a root can still lose an append, never corrupt a
/// collection.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Sibling of `path` no other append will use
    fn temp_path(path: &Path) -> PathBuf {
        let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        path.with_extension(format!("json.{}-{}.tmp", std::process::id(), seq))
    }

    /// Collection file for an athlete
    pub fn collection_path(&self, athlete_name: &str) -> Result<PathBuf> {
        let token = sanitize(athlete_name);
        if token.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Client name '{}' contains no usable characters",
                athlete_name
            )));
        }
        Ok(self.root.join(format!("{}{}", token, COLLECTION_SUFFIX)))
    }

    /// Existing entries of a collection, kept as raw JSON so that entries
    /// this version cannot decode survive the rewrite
    async fn read_entries(path: &Path) -> Result<Vec<Value>> {
        let content = match tokio::fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice::<Vec<Value>>(&content).map_err(|e| {
            Error::Storage(format!(
                "Refusing to overwrite unreadable collection {}: {}",
                path.display(),
                e
            ))
        })
    }

    async fn collection_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_collection = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(COLLECTION_SUFFIX));
            // Anything that is not a directory is read; failures are
            // reported per file by query_all
            if is_collection && !entry.file_type().await?.is_dir() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl PersistenceGateway for DocumentStore {
    async fn append(&self, record: &CheckinRecord) -> Result<()> {
        let path = self.collection_path(&record.athlete_name)?;
        let value = serde_json::to_value(record)?;
        tokio::fs::create_dir_all(&self.root).await?;

        let _guard = self.write_lock.lock().await;

        let mut entries = Self::read_entries(&path).await?;
        entries.push(value);

        let body = serde_json::to_vec_pretty(&entries)?;
        let tmp = Self::temp_path(&path);
        if let Err(e) = tokio::fs::write(&tmp, body).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        debug!(
            path = %path.display(),
            entries = entries.len(),
            "Appended check-in to collection"
        );
        Ok(())
    }

    async fn query_all(&self) -> Result<QueryOutcome> {
        let mut outcome = QueryOutcome::default();

        for path in self.collection_files().await? {
            let content = match tokio::fs::read(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping unreadable collection {}: {}", path.display(), e);
                    outcome.skipped += 1;
                    continue;
                }
            };
            let entries = match serde_json::from_slice::<Vec<Value>>(&content) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Skipping unreadable collection {}: {}", path.display(), e);
                    outcome.skipped += 1;
                    continue;
                }
            };

            for (index, entry) in entries.into_iter().enumerate() {
                match decode_entry(entry) {
                    Ok(record) => outcome.records.push(record),
                    Err(e) => {
                        warn!(
                            "Skipping entry {} of {}: {}",
                            index,
                            path.display(),
                            e
                        );
                        outcome.skipped += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Document
    }
}

/// Decode one stored entry
///
/// Also reads the older entry layout: a `timestamp` key instead of
/// `created_at`, a `files` map of field name to path instead of
/// `photos`/`video`, and no `status`.
fn decode_entry(entry: Value) -> Result<CheckinRecord> {
    let Value::Object(mut obj) = entry else {
        return Err(Error::InvalidInput("entry is not a JSON object".to_string()));
    };

    normalize_created_at(&mut obj);

    if !obj.contains_key("photos") {
        if let Some(Value::Object(files)) = obj.remove("files") {
            let (photos, video) = split_legacy_files(files);
            obj.insert("photos".to_string(), Value::from(photos));
            obj.insert("video".to_string(), video.map(Value::from).unwrap_or(Value::Null));
        }
    }

    if !obj.contains_key("status") {
        let meals = obj.get("meals_compliant").and_then(Value::as_str);
        obj.insert("status".to_string(), Value::from(classify(meals).as_str()));
    }

    let mut record: CheckinRecord = serde_json::from_value(Value::Object(obj))?;
    record.normalize_paths();
    Ok(record)
}

fn normalize_created_at(obj: &mut Map<String, Value>) {
    let raw = obj
        .get("created_at")
        .or_else(|| obj.get("timestamp"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(ts) = raw.as_deref().and_then(parse_timestamp) {
        obj.insert("created_at".to_string(), Value::from(ts.to_rfc3339()));
    }
}

/// Photos come back in form order; fields not on the form go last
fn split_legacy_files(files: Map<String, Value>) -> (Vec<String>, Option<String>) {
    let mut photos = Vec::new();
    let mut video = None;

    for (field, path) in files {
        let Some(path) = path.as_str() else { continue };
        let path = normalize_separators(path);
        let path = path.strip_prefix("uploads/").unwrap_or(&path).to_string();
        if field == VIDEO_FIELD {
            video = Some(path);
        } else {
            let position = UPLOAD_FIELDS
                .iter()
                .position(|(name, _)| *name == field)
                .unwrap_or(UPLOAD_FIELDS.len());
            photos.push((position, path));
        }
    }

    // Stable, so unknown fields keep their relative order
    photos.sort_by_key(|(position, _)| *position);
    (photos.into_iter().map(|(_, path)| path).collect(), video)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{CheckinForm, CheckinStatus};
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(name: &str, date: &str) -> CheckinRecord {
        let form = CheckinForm {
            athlete_name: name.to_string(),
            checkin_date: date.to_string(),
            ..Default::default()
        };
        CheckinRecord::create(form, vec![], None, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_append_creates_per_athlete_files() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());

        store.append(&record("Jane Doe", "2024-01-15")).await.unwrap();
        store.append(&record("Jane Doe", "2024-01-22")).await.unwrap();
        store.append(&record("Bob", "2024-01-15")).await.unwrap();

        let jane: Vec<Value> =
            serde_json::from_slice(&std::fs::read(dir.path().join("jane_doe_checkins.json")).unwrap())
                .unwrap();
        assert_eq!(jane.len(), 2);
        assert!(dir.path().join("bob_checkins.json").exists());

        let outcome = store.query_all().await.unwrap();
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn test_query_on_missing_root_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path().join("not-yet"));
        let outcome = store.query_all().await.unwrap();
        assert!(outcome.records.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_entries_and_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());
        store.append(&record("Jane", "2024-01-15")).await.unwrap();

        // Bad element inside an otherwise good collection
        let path = dir.path().join("jane_checkins.json");
        let mut entries: Vec<Value> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        entries.push(json!({"athlete_name": "Jane"}));
        entries.push(json!("not an object"));
        std::fs::write(&path, serde_json::to_vec(&entries).unwrap()).unwrap();

        // Entirely unreadable collection
        std::fs::write(dir.path().join("bob_checkins.json"), b"{ not json").unwrap();

        let outcome = store.query_all().await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped, 3);
    }

    #[tokio::test]
    async fn test_append_keeps_undecodable_entries() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());
        let path = dir.path().join("jane_checkins.json");
        std::fs::write(&path, br#"[{"something": "from the future"}]"#).unwrap();

        store.append(&record("Jane", "2024-01-15")).await.unwrap();

        let entries: Vec<Value> = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["something"], "from the future");
    }

    #[tokio::test]
    async fn test_append_refuses_to_clobber_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());
        let path = dir.path().join("jane_checkins.json");
        std::fs::write(&path, b"garbage").unwrap();

        let err = store.append(&record("Jane", "2024-01-15")).await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"garbage");
    }

    #[tokio::test]
    async fn test_reads_older_entry_layout() {
        let dir = TempDir::new().unwrap();
        let legacy = json!([{
            "timestamp": "2024-01-15T10:30:00.123456",
            "athlete_name": "Jane Doe",
            "checkin_date": "2024-01-15",
            "division": "bikini",
            "meals_compliant": "70",
            "energy": "6",
            "files": {
                "pose_front_relaxed": "uploads\\jane_doe\\20240115\\front_relaxed_20240115_103000.jpg",
                "posing_video": "uploads/jane_doe/20240115/posing_video_20240115_103000.mp4"
            }
        }]);
        std::fs::write(
            dir.path().join("jane_doe_checkins.json"),
            serde_json::to_vec(&legacy).unwrap(),
        )
        .unwrap();

        let outcome = DocumentStore::new(dir.path()).query_all().await.unwrap();
        assert_eq!(outcome.skipped, 0);
        let record = &outcome.records[0];
        assert_eq!(record.status, CheckinStatus::NeedsAttention);
        assert_eq!(
            record.photos,
            vec!["jane_doe/20240115/front_relaxed_20240115_103000.jpg".to_string()]
        );
        assert_eq!(
            record.video.as_deref(),
            Some("jane_doe/20240115/posing_video_20240115_103000.mp4")
        );
    }

    #[tokio::test]
    async fn test_legacy_photos_follow_form_order() {
        let dir = TempDir::new().unwrap();
        let legacy = json!([{
            "timestamp": "2024-01-15T10:30:00",
            "athlete_name": "Jane",
            "checkin_date": "2024-01-15",
            "files": {
                "wp_front": "uploads/jane/20240115/wp_front.jpg",
                "bikini_rear": "uploads/jane/20240115/bikini_rear.jpg",
                "extra_shot": "uploads/jane/20240115/extra_shot.jpg",
                "pose_front_relaxed": "uploads/jane/20240115/front_relaxed.jpg",
                "bb_abs": "uploads/jane/20240115/bb_abs.jpg"
            }
        }]);
        std::fs::write(
            dir.path().join("jane_checkins.json"),
            serde_json::to_vec(&legacy).unwrap(),
        )
        .unwrap();

        let outcome = DocumentStore::new(dir.path()).query_all().await.unwrap();
        assert_eq!(
            outcome.records[0].photos,
            vec![
                "jane/20240115/front_relaxed.jpg".to_string(),
                "jane/20240115/bikini_rear.jpg".to_string(),
                "jane/20240115/wp_front.jpg".to_string(),
                "jane/20240115/bb_abs.jpg".to_string(),
                "jane/20240115/extra_shot.jpg".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_concurrent_appends_for_one_athlete() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());

        let mut handles = Vec::new();
        for day in 1..=16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let date = format!("2024-01-{:02}", day);
                store.append(&record("Jane", &date)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let outcome = store.query_all().await.unwrap();
        assert_eq!(outcome.records.len(), 16);
        assert_eq!(outcome.skipped, 0);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_collection_file_is_skipped() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());
        store.append(&record("Jane", "2024-01-15")).await.unwrap();

        // Dangling link: listed as a collection, fails on read
        std::os::unix::fs::symlink(
            dir.path().join("nowhere.json"),
            dir.path().join("ghost_checkins.json"),
        )
        .unwrap();

        let outcome = store.query_all().await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn test_backslash_paths_normalized_on_read() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::new(dir.path());
        let mut rec = record("Jane", "2024-01-15");
        rec.photos = vec!["jane\\20240115\\a.jpg".to_string()];
        store.append(&rec).await.unwrap();

        let outcome = store.query_all().await.unwrap();
        assert_eq!(outcome.records[0].photos[0], "jane/20240115/a.jpg");
    }
}
