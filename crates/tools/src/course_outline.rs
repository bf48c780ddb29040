//! Course outline tool.

use async_trait::async_trait;
use std::sync::Arc;
use syllabus_core::error::ToolError;
use syllabus_core::tool::{Tool, ToolResult};
use syllabus_core::{Course, Source};
use syllabus_retrieval::CourseStore;
use tracing::warn;

pub struct CourseOutlineTool {
    store: Arc<CourseStore>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<CourseStore>) -> Self {
        Self { store }
    }

    async fn course_miss(&self, course_name: &str) -> ToolResult {
        match self.store.course_titles().await {
            Ok(titles) if titles.is_empty() => {
                ToolResult::failed("", "No courses available in the system.")
            }
            Ok(titles) => ToolResult::failed(
                "",
                format!(
                    "No course found matching '{course_name}'. Available courses: {}",
                    titles.join(", ")
                ),
            ),
            Err(e) => ToolResult::failed("", format!("Search error: {e}")),
        }
    }
}

/// Render the outline text and the lesson sources that carry links.
fn render_outline(course: &Course) -> (String, Vec<Source>) {
    let mut lines = vec![format!("Course: {}", course.title)];
    if let Some(link) = &course.course_link {
        lines.push(format!("Link: {link}"));
    }
    lines.push(format!(
        "Instructor: {}",
        course.instructor.as_deref().unwrap_or("Unknown")
    ));
    lines.push(String::new());
    lines.push("Lessons:".into());

    if course.lessons.is_empty() {
        lines.push("- No lessons available".into());
    }
    let mut sources = Vec::new();
    for lesson in &course.lessons {
        lines.push(format!("- Lesson {}: {}", lesson.lesson_number, lesson.title));
        if let Some(link) = &lesson.lesson_link {
            sources.push(Source::new(
                format!("{} - Lesson {}", course.title, lesson.lesson_number),
                Some(link.clone()),
            ));
        }
    }

    (lines.join("\n"), sources)
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        "get_course_outline"
    }

    fn description(&self) -> &str {
        "Get complete course outline including course title, link, instructor, and all lessons with numbers and titles. Use when users ask about course structure or lesson list."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "course_name": {
                    "type": "string",
                    "description": "Course title or partial name (e.g. 'MCP', 'Introduction')"
                }
            },
            "required": ["course_name"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let course_name = arguments["course_name"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'course_name' argument".into()))?;

        let title = match self.store.resolve_course_name(course_name).await {
            Ok(Some(title)) => title,
            Ok(None) => return Ok(self.course_miss(course_name).await),
            Err(e) => {
                warn!(error = %e, "Course resolution failed");
                return Ok(ToolResult::failed("", format!("Search error: {e}")));
            }
        };

        match self.store.course_metadata(&title).await {
            Ok(Some(course)) => {
                let (output, sources) = render_outline(&course);
                Ok(ToolResult::ok("", output).with_sources(sources))
            }
            Ok(None) => Ok(ToolResult::failed(
                "",
                format!("Error: Unable to retrieve metadata for '{title}'"),
            )),
            Err(e) => {
                warn!(course = %title, error = %e, "Outline lookup failed");
                Ok(ToolResult::failed("", format!("Search error: {e}")))
            }
        }
    }
}
