//! # Syllabus Core
//!
//! Domain types, traits, and error definitions for the Syllabus course
//! question-answering engine. This crate has **no framework dependencies**:
//! it defines the model that the retrieval, provider, tool, and agent crates
//! implement against.
//!
//! ## Seams
//!
//! - [`Provider`]: a hosted language model that may request tool calls
//! - [`Tool`]: a named, schema-described capability the model can invoke
//! - [`Embedder`]: turns text into vectors
//! - [`VectorIndex`]: upsert / query-by-vector storage capability

pub mod course;
pub mod error;
pub mod event;
pub mod index;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use course::{Course, CourseChunk, Lesson, Source};
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use index::{
    Embedder, IndexRecord, Metadata, MetadataFilter, SearchHit, SearchResults, VectorIndex,
};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{RequestContext, Tool, ToolCall, ToolRegistry, ToolResult};
