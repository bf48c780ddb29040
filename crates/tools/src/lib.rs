//! Capabilities the model can invoke while answering course questions.
//!
//! - `search_course_content`: semantic search with fuzzy course-name
//!   matching and lesson filtering
//! - `get_course_outline`: title, link, instructor and lesson list

pub mod course_outline;
pub mod search_course_content;

use std::sync::Arc;
use syllabus_core::tool::ToolRegistry;
use syllabus_retrieval::CourseStore;

pub use course_outline::CourseOutlineTool;
pub use search_course_content::CourseSearchTool;

/// Create a registry with both course capabilities over `store`.
pub fn course_registry(store: Arc<CourseStore>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CourseSearchTool::new(store.clone())));
    registry.register(Box::new(CourseOutlineTool::new(store)));
    registry
}
