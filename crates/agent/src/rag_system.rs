//! `RagSystem`: the top-level orchestrator.
//!
//! Owns the ingestion pipeline, the course store, the generator and the
//! session history, and wires one query through all of them.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use syllabus_core::error::{Error, ProviderError};
use syllabus_core::event::{DomainEvent, EventBus};
use syllabus_core::tool::RequestContext;
use syllabus_core::Source;
use syllabus_ingest::{course_documents, DocumentProcessor};
use syllabus_retrieval::CourseStore;
use tracing::{debug, info, warn};
use crate::generator::Generator;
use crate::history::SessionStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    pub session_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseCatalog {
    pub titles: Vec<String>,
    pub count: usize,
}

/// Counts from an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Courses newly added
    pub courses: usize,
    /// Chunks added for those courses
    pub chunks: usize,
    /// Documents whose title was already indexed
    pub skipped: usize,
    /// Documents that could not be read or parsed
    pub failed: usize,
}

impl IngestSummary {
    fn merge(&mut self, other: IngestSummary) {
        self.courses += other.courses;
        self.chunks += other.chunks;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

pub struct RagSystem {
    processor: DocumentProcessor,
    store: Arc<CourseStore>,
    generator: Generator,
    sessions: SessionStore,
    event_bus: Arc<EventBus>,
    query_timeout: Option<Duration>,
}

impl RagSystem {
    pub fn new(
        processor: DocumentProcessor,
        store: Arc<CourseStore>,
        generator: Generator,
        sessions: SessionStore,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            processor,
            store,
            generator,
            sessions,
            event_bus,
            query_timeout: None,
        }
    }

    /// Abort a whole query once `timeout` elapses.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout
    }

    pub fn store(&self) -> &Arc<CourseStore> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn generator(&self) -> &Generator {
        &self.generator
    }

    /// Answer `text` in the context of `session_id`, opening a new session
    /// when none is given.
    pub async fn query(
        &self,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<QueryResponse, Error> {
        let session_id = match session_id {
            Some(id) => id.to_string(),
            None => self.sessions.create_session().await,
        };
        let history = self.sessions.format_recent(&session_id).await;
        let prompt = format!("Answer this question about course materials: {text}");
        let mut ctx = RequestContext::new();

        info!(session_id = %session_id, has_history = history.is_some(), "Processing query");

        let run = self
            .generator
            .generate(&prompt, history.as_deref(), &session_id, &mut ctx);
        let generation = match self.query_timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                ProviderError::Timeout(format!("query exceeded {}s", limit.as_secs()))
            })?,
            None => run.await,
        };
        let generation = match generation {
            Ok(generation) => generation,
            Err(e) => {
                self.event_bus.publish(DomainEvent::ErrorOccurred {
                    context: "query".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                return Err(e.into());
            }
        };

        let sources = ctx.take_sources();
        self.sessions
            .append(&session_id, text, generation.answer.clone())
            .await;

        debug!(session_id = %session_id, sources = sources.len(), "Query answered");
        Ok(QueryResponse {
            answer: generation.answer,
            sources,
            session_id,
        })
    }

    pub async fn handle(&self, request: QueryRequest) -> Result<QueryResponse, Error> {
        self.query(&request.query, request.session_id.as_deref()).await
    }

    /// Parse, chunk and index one course document. A title that is already
    /// present is skipped.
    pub async fn add_course_document(&self, path: &Path) -> Result<IngestSummary, Error> {
        let (course, chunks) = self.processor.process_file(path)?;
        if !self.store.add_course(&course, &chunks).await? {
            info!(course = %course.title, "Course already present, skipped");
            return Ok(IngestSummary {
                skipped: 1,
                ..IngestSummary::default()
            });
        }

        self.event_bus.publish(DomainEvent::CourseIngested {
            course_title: course.title.clone(),
            lessons: course.lessons.len(),
            chunks: chunks.len(),
            timestamp: Utc::now(),
        });
        Ok(IngestSummary {
            courses: 1,
            chunks: chunks.len(),
            ..IngestSummary::default()
        })
    }

    /// Ingest every course document in `dir`. Unreadable documents are
    /// logged and counted, not fatal.
    pub async fn add_course_folder(
        &self,
        dir: &Path,
        clear_existing: bool,
    ) -> Result<IngestSummary, Error> {
        if clear_existing {
            self.store.clear().await?;
        }
        let mut summary = IngestSummary::default();
        for path in course_documents(dir)? {
            match self.add_course_document(&path).await {
                Ok(one) => summary.merge(one),
                Err(Error::Ingest(e)) => {
                    warn!(path = %path.display(), error = %e, "Skipping course document");
                    summary.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }
        info!(
            courses = summary.courses,
            chunks = summary.chunks,
            skipped = summary.skipped,
            failed = summary.failed,
            "Course folder ingested"
        );
        Ok(summary)
    }

    pub async fn course_catalog(&self) -> Result<CourseCatalog, Error> {
        let titles = self.store.course_titles().await?;
        Ok(CourseCatalog {
            count: titles.len(),
            titles,
        })
    }
}
