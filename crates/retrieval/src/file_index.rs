//! File-backed index: persistent JSON-lines storage.
//!
//! Each line is a JSON-encoded [`IndexRecord`]. Records are loaded into
//! memory on open and the whole file is rewritten on every mutation, so reads
//! never touch disk. Rewrites go through a sibling `.tmp` file and a rename.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use syllabus_core::error::IndexError;
use syllabus_core::{IndexRecord, MetadataFilter, SearchHit, VectorIndex};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use crate::vector::rank;

pub struct FileIndex {
    path: PathBuf,
    records: RwLock<BTreeMap<String, IndexRecord>>,
}

impl FileIndex {
    /// Open the index at `path`, loading any records already there.
    ///
    /// A missing file starts empty; it is created on first write. Any other
    /// read failure is an error, so an unreadable index is never overwritten.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, IndexError> {
        let path = path.into();
        let records = Self::load_from_disk(&path)?;
        debug!(path = %path.display(), count = records.len(), "File index loaded");
        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_disk(path: &Path) -> Result<BTreeMap<String, IndexRecord>, IndexError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(IndexError::Unavailable {
                    backend: "file".into(),
                    reason: format!("cannot read {}: {e}", path.display()),
                });
            }
        };

        let mut records = BTreeMap::new();
        for (n, line) in bytes.split(|b| *b == b'\n').enumerate() {
            let line = match std::str::from_utf8(line) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        line = n + 1,
                        error = %e,
                        "Skipping non-UTF-8 index record"
                    );
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<IndexRecord>(line) {
                Ok(record) => {
                    records.insert(record.id.clone(), record);
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        line = n + 1,
                        error = %e,
                        "Skipping corrupted index record"
                    );
                }
            }
        }
        Ok(records)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replace the file with `records`. Callers hold the write lock and only
    /// commit `records` to memory once this succeeds.
    fn flush(&self, records: &BTreeMap<String, IndexRecord>) -> Result<(), IndexError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| IndexError::Unavailable {
                backend: "file".into(),
                reason: format!("cannot create {}: {e}", parent.display()),
            })?;
        }

        let mut content = String::new();
        for record in records.values() {
            let line = serde_json::to_string(record).map_err(|e| {
                IndexError::Storage(format!("Failed to serialize index record: {e}"))
            })?;
            content.push_str(&line);
            content.push('\n');
        }

        let tmp = self.temp_path();
        let written = std::fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(content.as_bytes())?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|()| std::fs::rename(&tmp, &self.path)) {
            let _ = std::fs::remove_file(&tmp);
            return Err(IndexError::Storage(format!(
                "Failed to write index file {}: {e}",
                self.path.display()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for FileIndex {
    fn name(&self) -> &str {
        "file"
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), IndexError> {
        let mut map = self.records.write().await;
        let mut next = map.clone();
        for record in records {
            next.insert(record.id.clone(), record);
        }
        self.flush(&next)?;
        *map = next;
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<SearchHit>, IndexError> {
        let map = self.records.read().await;
        rank(map.values(), embedding, top_k, filter)
    }

    async fn get(&self, ids: &[String]) -> Result<Vec<IndexRecord>, IndexError> {
        let map = self.records.read().await;
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn ids(&self) -> Result<Vec<String>, IndexError> {
        Ok(self.records.read().await.keys().cloned().collect())
    }

    async fn count(&self) -> Result<usize, IndexError> {
        Ok(self.records.read().await.len())
    }

    async fn clear(&self) -> Result<(), IndexError> {
        let mut map = self.records.write().await;
        self.flush(&BTreeMap::new())?;
        map.clear();
        Ok(())
    }
}
