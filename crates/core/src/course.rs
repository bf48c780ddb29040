//! Course domain types.
//!
//! A [`Course`] is identified by its title. Lessons are numbered uniquely
//! within a course, and each lesson's text is split into [`CourseChunk`]s
//! whose identity is `(course_title, chunk_index)`.

use serde::{Deserialize, Serialize};

/// A course parsed from a course document. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Unique title; the identity key for both indices
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,

    /// Lessons in document order
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    /// Look up a lesson by number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
}

/// A context-prefixed slice of lesson text stored in the content index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    /// Chunk text including its `Course … Lesson … content:` header
    pub content: String,

    pub course_title: String,

    /// `None` only for documents without lesson markers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_number: Option<u32>,

    /// Sequential across the whole course
    pub chunk_index: usize,
}

impl CourseChunk {
    /// The stable identity used as the index record id.
    pub fn id(&self) -> String {
        chunk_id(&self.course_title, self.chunk_index)
    }
}

/// Build the record id for a chunk of a course.
pub fn chunk_id(course_title: &str, chunk_index: usize) -> String {
    format!("{course_title}_{chunk_index}")
}

/// A provenance record shown alongside an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Display label, e.g. `"Intro to X - Lesson 1"`
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

impl Source {
    pub fn new(text: impl Into<String>, link: Option<String>) -> Self {
        Self {
            text: text.into(),
            link,
        }
    }
}
