//! Course document parsing.
//!
//! ```text
//! Course Title: Intro to X
//! Course Link: https://example.com/x
//! Course Instructor: Ada Lovelace
//!
//! Lesson 0: Welcome
//! Lesson Link: https://example.com/x/0
//! Lesson text...
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use syllabus_core::error::IngestError;
use syllabus_core::{Course, CourseChunk, Lesson};
use tracing::{debug, warn};
use crate::chunker::Chunker;

/// A parsed document ready for chunking.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCourse {
    pub course: Course,
    /// Lesson bodies in document order
    pub sections: Vec<LessonSection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LessonSection {
    /// `None` when the document has no lesson markers
    pub lesson_number: Option<u32>,
    pub text: String,
}

/// Parses course documents and chunks their lessons.
#[derive(Debug, Clone, Default)]
pub struct DocumentProcessor {
    chunker: Chunker,
}

impl DocumentProcessor {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    /// Parse the document format into a course and its lesson bodies.
    pub fn parse(&self, text: &str) -> Result<ParsedCourse, IngestError> {
        let lines: Vec<&str> = text.lines().collect();

        let mut title = None;
        let mut course_link = None;
        let mut instructor = None;
        let mut body_start = 1;
        for (idx, line) in lines.iter().take(3).enumerate() {
            let line = line.trim();
            if let Some(value) = strip_label(line, "Course Title:") {
                title = Some(value.to_string());
            } else if let Some(value) = strip_label(line, "Course Link:") {
                course_link = non_empty(value);
            } else if let Some(value) = strip_label(line, "Course Instructor:") {
                instructor = non_empty(value);
            } else {
                continue;
            }
            body_start = idx + 1;
        }

        let title = title
            .or_else(|| lines.first().map(|l| l.trim().to_string()))
            .filter(|t| !t.is_empty())
            .ok_or(IngestError::MissingTitle(None))?;

        let mut course = Course {
            title,
            course_link,
            instructor,
            lessons: Vec::new(),
        };
        let body = lines.get(body_start..).unwrap_or_default();
        let sections = parse_lessons(&mut course, body);

        Ok(ParsedCourse { course, sections })
    }

    /// Parse `text` and chunk every lesson. Chunk indices run across the
    /// whole course.
    pub fn process_text(&self, text: &str) -> Result<(Course, Vec<CourseChunk>), IngestError> {
        let parsed = self.parse(text)?;
        let mut chunks = Vec::new();
        for section in &parsed.sections {
            let lesson_chunks = self.chunker.chunk_lesson(
                &section.text,
                &parsed.course.title,
                section.lesson_number,
                chunks.len(),
            );
            chunks.extend(lesson_chunks);
        }
        debug!(
            course = %parsed.course.title,
            lessons = parsed.course.lessons.len(),
            chunks = chunks.len(),
            "Processed course document"
        );
        Ok((parsed.course, chunks))
    }

    /// Read and process one course document. Invalid UTF-8 is replaced
    /// rather than rejected.
    pub fn process_file(&self, path: &Path) -> Result<(Course, Vec<CourseChunk>), IngestError> {
        let bytes = std::fs::read(path).map_err(|e| IngestError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let text = String::from_utf8_lossy(&bytes);
        self.process_text(&text).map_err(|e| match e {
            IngestError::MissingTitle(None) => IngestError::MissingTitle(Some(path.to_path_buf())),
            other => other,
        })
    }
}

/// Course documents (`.txt`) directly inside `dir`, sorted by path.
pub fn course_documents(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::FolderNotFound(dir.to_path_buf()));
    }
    let entries = std::fs::read_dir(dir).map_err(|e| IngestError::ReadFailed {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    let mut paths = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if is_course_document(&path) {
            paths.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-course file");
        }
    }
    paths.sort();
    Ok(paths)
}

fn is_course_document(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

fn parse_lessons(course: &mut Course, body: &[&str]) -> Vec<LessonSection> {
    let markers: Vec<(usize, u32, String)> = body
        .iter()
        .enumerate()
        .filter_map(|(idx, line)| parse_lesson_marker(line).map(|(n, t)| (idx, n, t)))
        .collect();

    if markers.is_empty() {
        let text = body.join("\n").trim().to_string();
        if text.is_empty() {
            return Vec::new();
        }
        return vec![LessonSection {
            lesson_number: None,
            text,
        }];
    }

    let mut seen = HashSet::new();
    let mut sections = Vec::new();
    for (pos, (start, lesson_number, title)) in markers.iter().enumerate() {
        let end = markers.get(pos + 1).map(|m| m.0).unwrap_or(body.len());
        if !seen.insert(*lesson_number) {
            warn!(
                course = %course.title,
                lesson = lesson_number,
                "Duplicate lesson number, keeping the first occurrence"
            );
            continue;
        }

        let mut text_start = start + 1;
        let mut lesson_link = None;
        if text_start < end
            && let Some(value) = strip_label(body[text_start].trim(), "Lesson Link:")
        {
            lesson_link = non_empty(value);
            text_start += 1;
        }

        course.lessons.push(Lesson {
            lesson_number: *lesson_number,
            title: title.clone(),
            lesson_link,
        });

        let text = body[text_start.min(end)..end].join("\n").trim().to_string();
        if !text.is_empty() {
            sections.push(LessonSection {
                lesson_number: Some(*lesson_number),
                text,
            });
        }
    }
    sections
}

/// Match `Lesson <int>: <title>`, case-insensitively.
fn parse_lesson_marker(line: &str) -> Option<(u32, String)> {
    let rest = strip_label(line.trim(), "Lesson")?;
    let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }
    let number = rest[..digits_end].parse().ok()?;
    let title = rest[digits_end..].strip_prefix(':')?;
    Some((number, title.trim().to_string()))
}

/// Case-insensitive label prefix; returns the trimmed remainder.
fn strip_label<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let head = line.get(..label.len())?;
    if !head.eq_ignore_ascii_case(label) {
        return None;
    }
    Some(line[label.len()..].trim())
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
