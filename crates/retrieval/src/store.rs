//! `CourseStore`: the dual-index retrieval engine.
//!
//! The catalog index holds one record per course (id and document are the
//! title; lessons live in metadata). The content index holds every chunk.
//! A search first resolves a fuzzy course name against the catalog, then
//! queries content filtered by the resolved title and lesson number.

use std::sync::Arc;
use serde_json::{json, Value};
use syllabus_core::error::{IndexError, SearchError};
use syllabus_core::{
    Course, CourseChunk, Embedder, IndexRecord, Lesson, Metadata, MetadataFilter, SearchResults,
    VectorIndex,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use crate::memory_index::InMemoryIndex;

/// Texts per embedder call during ingestion.
const EMBED_BATCH: usize = 64;

pub struct CourseStore {
    catalog: Arc<dyn VectorIndex>,
    content: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    min_course_similarity: f32,
    /// Serialises `add_course` so the presence check and the write are atomic
    ingest_lock: Mutex<()>,
}

impl CourseStore {
    pub fn new(
        catalog: Arc<dyn VectorIndex>,
        content: Arc<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            catalog,
            content,
            embedder,
            max_results: 5,
            min_course_similarity: 0.25,
            ingest_lock: Mutex::new(()),
        }
    }

    /// Both indices in memory.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Self {
        Self::new(
            Arc::new(InMemoryIndex::new()),
            Arc::new(InMemoryIndex::new()),
            embedder,
        )
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_min_course_similarity(mut self, min: f32) -> Self {
        self.min_course_similarity = min;
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn backend_names(&self) -> (&str, &str) {
        (self.catalog.name(), self.content.name())
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.name()
    }

    /// Add a course and its chunks unless the title is already present.
    ///
    /// Returns `false` when the course was skipped.
    pub async fn add_course(
        &self,
        course: &Course,
        chunks: &[CourseChunk],
    ) -> Result<bool, SearchError> {
        let _guard = self.ingest_lock.lock().await;
        if self.has_course(&course.title).await? {
            debug!(course = %course.title, "Course already indexed, skipping");
            return Ok(false);
        }
        self.add_course_content(chunks).await?;
        self.add_course_metadata(course).await?;
        info!(
            course = %course.title,
            lessons = course.lessons.len(),
            chunks = chunks.len(),
            "Course indexed"
        );
        Ok(true)
    }

    /// Upsert the catalog record for `course`.
    pub async fn add_course_metadata(&self, course: &Course) -> Result<(), IndexError> {
        let embedding = self.embed_one(&course.title).await?;
        let record = IndexRecord {
            id: course.title.clone(),
            document: course.title.clone(),
            metadata: catalog_metadata(course)?,
            embedding,
        };
        self.catalog.upsert(vec![record]).await
    }

    /// Upsert content records for `chunks`.
    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<(), IndexError> {
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(IndexError::EmbeddingFailed(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }
            let records = batch
                .iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexRecord {
                    id: chunk.id(),
                    document: chunk.content.clone(),
                    metadata: content_metadata(chunk),
                    embedding,
                })
                .collect();
            self.content.upsert(records).await?;
        }
        Ok(())
    }

    pub async fn has_course(&self, title: &str) -> Result<bool, IndexError> {
        Ok(!self.catalog.get(&[title.to_string()]).await?.is_empty())
    }

    /// Nearest catalog title to `name`, or `None` when the catalog is empty
    /// or the best match is below the similarity floor.
    pub async fn resolve_course_name(&self, name: &str) -> Result<Option<String>, SearchError> {
        if self.catalog.count().await? == 0 {
            return Ok(None);
        }
        let embedding = self.embed_one(name).await?;
        let hits = self.catalog.query(&embedding, 1, None).await?;
        let Some(best) = hits.into_iter().next() else {
            return Ok(None);
        };

        let similarity = 1.0 - best.distance;
        if similarity < self.min_course_similarity {
            debug!(query = name, best = %best.id, similarity, "Course name below similarity floor");
            return Ok(None);
        }
        debug!(query = name, resolved = %best.id, similarity, "Resolved course name");
        Ok(Some(best.id))
    }

    /// Semantic search over lesson content.
    ///
    /// A `course_name` that resolves to nothing is `CourseNotFound`; an empty
    /// result set is `Ok`.
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> Result<SearchResults, SearchError> {
        let mut clauses = Vec::new();
        if let Some(name) = course_name {
            let title = self
                .resolve_course_name(name)
                .await?
                .ok_or_else(|| SearchError::CourseNotFound(name.to_string()))?;
            clauses.push(MetadataFilter::eq("course_title", title));
        }
        if let Some(n) = lesson_number {
            clauses.push(MetadataFilter::eq("lesson_number", n));
        }
        let filter = MetadataFilter::all(clauses);

        let embedding = self.embed_one(query).await?;
        let hits = self
            .content
            .query(&embedding, self.max_results, filter.as_ref())
            .await?;
        debug!(query, hits = hits.len(), "Content search");
        Ok(SearchResults::new(hits))
    }

    /// All course titles, sorted.
    pub async fn course_titles(&self) -> Result<Vec<String>, IndexError> {
        self.catalog.ids().await
    }

    pub async fn course_count(&self) -> Result<usize, IndexError> {
        self.catalog.count().await
    }

    /// Rebuild the course record stored in the catalog.
    pub async fn course_metadata(&self, title: &str) -> Result<Option<Course>, IndexError> {
        let records = self.catalog.get(&[title.to_string()]).await?;
        Ok(records.into_iter().next().map(|r| course_from_metadata(&r.id, &r.metadata)))
    }

    pub async fn course_link(&self, title: &str) -> Result<Option<String>, IndexError> {
        Ok(self.course_metadata(title).await?.and_then(|c| c.course_link))
    }

    pub async fn lesson_link(
        &self,
        title: &str,
        lesson_number: u32,
    ) -> Result<Option<String>, IndexError> {
        Ok(self
            .course_metadata(title)
            .await?
            .and_then(|c| c.lesson(lesson_number).and_then(|l| l.lesson_link.clone())))
    }

    /// Drop every record from both indices.
    pub async fn clear(&self) -> Result<(), IndexError> {
        self.catalog.clear().await?;
        self.content.clear().await?;
        info!("Cleared course indices");
        Ok(())
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, IndexError> {
        self.embedder
            .embed(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| IndexError::EmbeddingFailed("embedder returned no vector".into()))
    }
}

fn catalog_metadata(course: &Course) -> Result<Metadata, IndexError> {
    let lessons = serde_json::to_value(&course.lessons)
        .map_err(|e| IndexError::Storage(format!("Failed to encode lessons: {e}")))?;
    let mut meta = Metadata::new();
    meta.insert("title".into(), json!(course.title));
    if let Some(link) = &course.course_link {
        meta.insert("course_link".into(), json!(link));
    }
    if let Some(instructor) = &course.instructor {
        meta.insert("instructor".into(), json!(instructor));
    }
    meta.insert("lesson_count".into(), json!(course.lessons.len()));
    meta.insert("lessons".into(), lessons);
    Ok(meta)
}

fn content_metadata(chunk: &CourseChunk) -> Metadata {
    let mut meta = Metadata::new();
    meta.insert("course_title".into(), json!(chunk.course_title));
    if let Some(n) = chunk.lesson_number {
        meta.insert("lesson_number".into(), json!(n));
    }
    meta.insert("chunk_index".into(), json!(chunk.chunk_index));
    meta
}

fn course_from_metadata(id: &str, meta: &Metadata) -> Course {
    let text = |key: &str| meta.get(key).and_then(Value::as_str).map(str::to_string);
    let lessons = match meta.get("lessons") {
        Some(value) => serde_json::from_value::<Vec<Lesson>>(value.clone()).unwrap_or_else(|e| {
            warn!(course = id, error = %e, "Unreadable lesson list in catalog");
            Vec::new()
        }),
        None => Vec::new(),
    };
    Course {
        title: text("title").unwrap_or_else(|| id.to_string()),
        course_link: text("course_link"),
        instructor: text("instructor"),
        lessons,
    }
}
