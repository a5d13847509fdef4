use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{StateBackend, StoreError};

/// One pretty-printed `<slot>.json` file per slot under a data directory.
///
/// Writes go to `<slot>.json.tmp` first and are renamed into place, so a
/// crash mid-write leaves the previous file untouched.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(format!("{slot}.json"))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl StateBackend for FileBackend {
    async fn load(&self, slot: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let path = self.slot_path(slot);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(&path, e)),
        };

        let value = serde_json::from_str(&content).map_err(|source| StoreError::Decode {
            slot: slot.to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    async fn store(&self, slot: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;

        let body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
            slot: slot.to_string(),
            source,
        })?;

        let path = self.slot_path(slot);
        let tmp = self.dir.join(format!("{slot}.json.tmp"));
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        tracing::debug!(slot, path = %path.display(), "slot written");
        Ok(())
    }
}
