//! Course content search tool.
//!
//! Wraps [`CourseStore::search`] and turns every outcome into text the model
//! can read: formatted hits, an empty-result notice, a resolution miss, or a
//! retrieval fault. Each hit also becomes a [`Source`].

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use syllabus_core::error::{SearchError, ToolError};
use syllabus_core::tool::{Tool, ToolResult};
use syllabus_core::{Course, SearchResults, Source};
use syllabus_retrieval::CourseStore;
use tracing::warn;

pub struct CourseSearchTool {
    store: Arc<CourseStore>,
}

impl CourseSearchTool {
    pub fn new(store: Arc<CourseStore>) -> Self {
        Self { store }
    }

    async fn format_results(&self, results: &SearchResults) -> (String, Vec<Source>) {
        let mut courses: HashMap<String, Option<Course>> = HashMap::new();
        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for hit in &results.hits {
            let course_title = hit
                .metadata
                .get("course_title")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown")
                .to_string();
            let lesson_number = hit
                .metadata
                .get("lesson_number")
                .and_then(|v| v.as_u64())
                .and_then(|n| u32::try_from(n).ok());

            let label = match lesson_number {
                Some(n) => format!("{course_title} - Lesson {n}"),
                None => course_title.clone(),
            };

            let link = match lesson_number {
                Some(n) => {
                    if !courses.contains_key(&course_title) {
                        let course = self
                            .store
                            .course_metadata(&course_title)
                            .await
                            .unwrap_or_else(|e| {
                                warn!(
                                    course = %course_title,
                                    error = %e,
                                    "Lesson link lookup failed"
                                );
                                None
                            });
                        courses.insert(course_title.clone(), course);
                    }
                    courses
                        .get(&course_title)
                        .and_then(|c| c.as_ref())
                        .and_then(|c| c.lesson(n))
                        .and_then(|l| l.lesson_link.clone())
                }
                None => None,
            };

            blocks.push(format!("[{label}]\n{}", hit.document));
            sources.push(Source::new(label, link));
        }

        (blocks.join("\n\n"), sources)
    }
}

fn empty_message(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
    let mut filter_info = String::new();
    if let Some(name) = course_name {
        filter_info.push_str(&format!(" in course '{name}'"));
    }
    if let Some(n) = lesson_number {
        filter_info.push_str(&format!(" in lesson {n}"));
    }
    format!("No relevant content found{filter_info}.")
}

fn lesson_number_arg(arguments: &serde_json::Value) -> Result<Option<u32>, ToolError> {
    match arguments.get("lesson_number") {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| {
                ToolError::InvalidArguments("'lesson_number' must be a non-negative integer".into())
            }),
    }
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn name(&self) -> &str {
        "search_course_content"
    }

    fn description(&self) -> &str {
        "Search course materials with smart course name matching and lesson filtering"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search for in the course content"
                },
                "course_name": {
                    "type": "string",
                    "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                },
                "lesson_number": {
                    "type": "integer",
                    "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let course_name = arguments
            .get("course_name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let lesson_number = lesson_number_arg(&arguments)?;

        match self.store.search(query, course_name, lesson_number).await {
            Ok(results) if results.is_empty() => {
                Ok(ToolResult::ok("", empty_message(course_name, lesson_number)))
            }
            Ok(results) => {
                let (output, sources) = self.format_results(&results).await;
                Ok(ToolResult::ok("", output).with_sources(sources))
            }
            Err(e @ SearchError::CourseNotFound(_)) => Ok(ToolResult::failed("", e.to_string())),
            Err(SearchError::Index(e)) => {
                warn!(error = %e, "Course search failed");
                Ok(ToolResult::failed("", format!("Search error: {e}")))
            }
        }
    }
}
