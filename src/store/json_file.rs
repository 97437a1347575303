//! JSON-array document store (one file, rewritten atomically on each write).

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use super::{next_id, PersistenceError, StartupStore};
use crate::record::{RecordId, ScoreUpdate, StartupRecord};

pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within the process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Run file I/O on the blocking pool. Callers hold `lock` across the await.
    async fn blocking<T, F>(&self, f: F) -> Result<T, PersistenceError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, PersistenceError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(&path))
            .await
            .map_err(|e| PersistenceError::Io(io::Error::other(e)))?
    }
}

/// Missing file reads as an empty store. Records without `_id` get one here;
/// the flag reports whether that happened.
fn load(path: &Path) -> Result<(Vec<StartupRecord>, bool), PersistenceError> {
    let data = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), false)),
        Err(e) => return Err(e.into()),
    };
    if data.trim().is_empty() {
        return Ok((Vec::new(), false));
    }
    let mut records: Vec<StartupRecord> = serde_json::from_str(&data)?;
    let mut assigned = false;
    for r in records.iter_mut().filter(|r| r.id.is_none()) {
        r.id = Some(next_id());
        assigned = true;
    }
    Ok((records, assigned))
}

fn save(path: &Path, records: &[StartupRecord]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(records)?;
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(&json)?;
    f.sync_all()?;
    fs::rename(tmp, path)?;
    Ok(())
}

#[async_trait::async_trait]
impl StartupStore for JsonFileStore {
    async fn find_all(&self) -> Result<Vec<StartupRecord>, PersistenceError> {
        let _g = self.lock.lock().await;
        self.blocking(|path| {
            let (records, assigned) = load(path)?;
            // Pin ids assigned on load so later updates can find them.
            if assigned {
                save(path, &records)?;
            }
            Ok(records)
        })
        .await
    }

    async fn insert(&self, mut record: StartupRecord) -> Result<RecordId, PersistenceError> {
        let _g = self.lock.lock().await;
        let id = next_id();
        record.id = Some(id.clone());
        self.blocking(move |path| {
            let (mut records, _) = load(path)?;
            records.push(record);
            save(path, &records)
        })
        .await?;
        Ok(id)
    }

    async fn update(&self, id: &RecordId, fields: &ScoreUpdate) -> Result<(), PersistenceError> {
        let _g = self.lock.lock().await;
        let id = id.clone();
        let fields = fields.clone();
        self.blocking(move |path| {
            let (mut records, _) = load(path)?;
            let rec = records
                .iter_mut()
                .find(|r| r.id.as_ref() == Some(&id))
                .ok_or_else(|| PersistenceError::NotFound(id.clone()))?;
            rec.apply_update(&fields);
            save(path, &records)
        })
        .await
    }
}
