//! Course document ingestion for Syllabus.
//!
//! - [`document`]: parses the `Course Title:` / `Lesson N:` document format
//! - [`chunker`]: splits lesson text into overlapping sentence windows

pub mod chunker;
pub mod document;

pub use chunker::Chunker;
pub use document::{course_documents, DocumentProcessor, LessonSection, ParsedCourse};
