//! In-memory index: useful for testing and ephemeral runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use syllabus_core::error::IndexError;
use syllabus_core::{IndexRecord, MetadataFilter, SearchHit, VectorIndex};
use tokio::sync::RwLock;
use crate::vector::rank;

/// Records keyed by id, searched by brute force.
pub struct InMemoryIndex {
    records: RwLock<BTreeMap<String, IndexRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), IndexError> {
        let mut map = self.records.write().await;
        for record in records {
            map.insert(record.id.clone(), record);
        }
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
        self.records.write().await.clear();
        Ok(())
    }
}
