//! Vector index and embedder traits.
//!
//! The retrieval engine only needs two capabilities from its storage layer:
//! upsert records with an embedding, and query by vector with an optional
//! metadata filter. Everything else (persistence format, ANN structure) is
//! behind [`VectorIndex`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::IndexError;

/// Flat key/value metadata stored next to each record.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// One stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Unique ID; upserting an existing ID replaces the record
    pub id: String,

    /// The embedded text
    pub document: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub embedding: Vec<f32>,
}

/// A query match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// `1 - cosine_similarity`; lower is closer
    pub distance: f32,
}

/// Ordered hits, closest first. May be empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
}

impl SearchResults {
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

/// Conjunctive equality filter over record metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataFilter {
    Eq { key: String, value: serde_json::Value },
    And(Vec<MetadataFilter>),
}

impl MetadataFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::Eq {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Combine clauses: none → no filter, one → itself, many → `And`.
    pub fn all(mut clauses: Vec<MetadataFilter>) -> Option<Self> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Self::And(clauses)),
        }
    }

    /// Reject filters no backend can evaluate meaningfully.
    pub fn validate(&self) -> std::result::Result<(), IndexError> {
        match self {
            Self::Eq { key, .. } if key.is_empty() => {
                Err(IndexError::InvalidFilter("empty metadata key".into()))
            }
            Self::Eq { .. } => Ok(()),
            Self::And(clauses) if clauses.is_empty() => {
                Err(IndexError::InvalidFilter("empty AND".into()))
            }
            Self::And(clauses) => clauses.iter().try_for_each(Self::validate),
        }
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            Self::Eq { key, value } => metadata.get(key) == Some(value),
            Self::And(clauses) => clauses.iter().all(|c| c.matches(metadata)),
        }
    }
}

/// Storage capability for embedded records.
///
/// Implementations: in-memory (tests, ephemeral runs) and JSON-lines file.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The backend name (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Insert or replace records by ID.
    async fn upsert(&self, records: Vec<IndexRecord>) -> std::result::Result<(), IndexError>;

    /// Return up to `top_k` records ordered by ascending distance.
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&MetadataFilter>,
    ) -> std::result::Result<Vec<SearchHit>, IndexError>;

    /// Fetch records by ID, skipping unknown IDs.
    async fn get(&self, ids: &[String]) -> std::result::Result<Vec<IndexRecord>, IndexError>;

    /// All record IDs in ascending order.
    async fn ids(&self) -> std::result::Result<Vec<String>, IndexError>;

    async fn count(&self) -> std::result::Result<usize, IndexError>;

    async fn clear(&self) -> std::result::Result<(), IndexError>;
}

/// Text → vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;

    /// Embed a batch; the output has one vector per input, in order.
    async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, IndexError>;
}
