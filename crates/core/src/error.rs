//! Error types for the Syllabus domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all Syllabus operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Retrieval errors ---
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    // --- Ingestion errors ---
    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the hosted language model. Not locally recoverable.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Faults raised by a vector index or the embedder feeding it.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Index unavailable ({backend}): {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("Invalid metadata filter: {0}")]
    InvalidFilter(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),
}

/// Outcome of a course search that did not produce a result set.
///
/// An empty result set is *not* an error; it is `Ok` with no hits.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("No course found matching '{0}'")]
    CourseNotFound(String),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to read course document at {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error(
        "Course document has no title{}",
        .0.as_ref().map(|p| format!(" ({})", p.display())).unwrap_or_default()
    )]
    MissingTitle(Option<PathBuf>),

    #[error("Course folder not found: {0}")]
    FolderNotFound(PathBuf),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),
}
