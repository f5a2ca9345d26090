use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::onboarding::OnboardingRecord;

/// The single key the onboarding record lives under.
pub const ONBOARDING_KEY: &str = "studymate.onboarding";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Key-value storage with one JSON file per user.
pub struct JsonFileStore {
    dir: PathBuf,
    // Serialises read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn path_for(&self, user: &str) -> PathBuf {
        self.dir.join(format!("{}.json", user))
    }

    /// Loads the record, or an empty one if nothing was stored yet.
    pub async fn load(&self, user: &str) -> Result<OnboardingRecord, StoreError> {
        let mut entries = read_entries(&self.path_for(user)).await?;
        match entries.remove(ONBOARDING_KEY) {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(OnboardingRecord::default()),
        }
    }

    pub async fn save(&self, user: &str, record: &OnboardingRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        self.write_record(user, record).await
    }

    /// Merges one stage result into the stored record and writes it back.
    pub async fn complete_stage(
        &self,
        user: &str,
        stage: &str,
        result: Value,
    ) -> Result<OnboardingRecord, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.load(user).await?;
        record.merge_stage(stage, result);
        self.write_record(user, &record).await?;
        debug!("Stored onboarding stage '{}' for {}", stage, user);
        Ok(record)
    }

    async fn write_record(&self, user: &str, record: &OnboardingRecord) -> Result<(), StoreError> {
        let path = self.path_for(user);
        // Keep whatever else lives in the file
        let mut entries = read_entries(&path).await?;
        entries.insert(ONBOARDING_KEY.to_string(), serde_json::to_value(record)?);

        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(entries))?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

async fn read_entries(path: &Path) -> Result<Map<String, Value>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
        Err(e) => return Err(e.into()),
    };
    match serde_json::from_slice(&bytes)? {
        Value::Object(map) => Ok(map),
        other => {
            warn!("Ignoring non-object storage file {:?}: {}", path, other);
            Ok(Map::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::{STAGE_LEARNING_STYLE, STAGE_PROFILE};
    use serde_json::json;

    #[tokio::test]
    async fn missing_record_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load("42").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stages_accumulate_across_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .complete_stage("42", STAGE_PROFILE, json!({"name": "Tunde", "exam": "NECO"}))
            .await
            .unwrap();
        store
            .complete_stage(
                "42",
                STAGE_LEARNING_STYLE,
                json!({"percentages": {}, "dominant": null}),
            )
            .await
            .unwrap();

        let record = store.load("42").await.unwrap();
        assert!(record.has_stage(STAGE_PROFILE));
        assert!(record.has_stage(STAGE_LEARNING_STYLE));
        assert_eq!(record.profile().name.as_deref(), Some("Tunde"));
        assert!(store.load("7").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn other_keys_in_the_file_survive() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("9.json"), br#"{"theme": "dark"}"#)
            .await
            .unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .complete_stage("9", STAGE_PROFILE, json!({"name": "Ife", "exam": "JAMB"}))
            .await
            .unwrap();

        let bytes = tokio::fs::read(dir.path().join("9.json")).await.unwrap();
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw[ONBOARDING_KEY]["profile"]["name"], "Ife");
    }
}
