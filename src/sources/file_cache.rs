use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use super::{cache_key, LocalCache};
use crate::error::CacheError;

/// One JSON array file per user under `dir`.
pub struct FileTicketCache {
    dir: PathBuf,
}

impl FileTicketCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, user_id: &str) -> PathBuf {
        // Percent-encoding keeps the file name injective in the user id.
        let key = urlencoding::encode(&cache_key(user_id)).into_owned();
        self.dir.join(format!("{key}.json"))
    }

    async fn save(&self, user_id: &str, records: &[Value]) -> Result<(), CacheError> {
        let path = self.path_for(user_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(records)?;
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    /// Records on disk, failing on anything but a JSON array.
    async fn read_strict(&self, user_id: &str) -> Result<Vec<Value>, CacheError> {
        let path = self.path_for(user_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let records: Vec<Value> = serde_json::from_str(&contents)?;
        debug!(count = records.len(), path = %path.display(), "read ticket cache");
        Ok(records)
    }
}

#[async_trait]
impl LocalCache for FileTicketCache {
    async fn read_all(&self, user_id: &str) -> Result<Vec<Value>, CacheError> {
        match self.read_strict(user_id).await {
            Err(CacheError::Serde(e)) => {
                warn!(path = %self.path_for(user_id).display(), error = %e, "ticket cache unparseable, ignoring");
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn clear_all(&self, user_id: &str) -> Result<(), CacheError> {
        match tokio::fs::remove_file(self.path_for(user_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn append(&self, user_id: &str, record: Value) -> Result<(), CacheError> {
        // A corrupt file is left alone rather than overwritten
        let mut records = self.read_strict(user_id).await?;
        records.push(record);
        self.save(user_id, &records).await
    }
}
