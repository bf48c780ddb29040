//! Retrieval engine for Syllabus.
//!
//! Two [`VectorIndex`](syllabus_core::VectorIndex) instances back the
//! [`CourseStore`]: a catalog of course titles used to resolve fuzzy course
//! names, and the lesson content chunks that searches run against.

pub mod embedding;
pub mod file_index;
#[cfg(feature = "local-embeddings")]
pub mod local_embedding;
pub mod memory_index;
pub mod store;
pub mod vector;

pub use embedding::HashEmbedder;
pub use file_index::FileIndex;
#[cfg(feature = "local-embeddings")]
pub use local_embedding::LocalEmbedder;
pub use memory_index::InMemoryIndex;
pub use store::CourseStore;
pub use vector::{cosine_similarity, rank};
