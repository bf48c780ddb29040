//! System prompt for the course assistant.

pub const SYSTEM_PROMPT: &str = "You are an AI assistant specialized in course materials and educational content, with access to tools for looking up course information.

Tool usage:
- Use `search_course_content` for questions about specific course content or detailed educational material
- Use `get_course_outline` for questions about course structure, lesson lists, instructors or course links
- Make at most one round of tool calls per question
- Synthesize tool results into accurate, fact-based answers
- If a tool finds nothing, say so plainly instead of guessing

When outlining a course, include the course title, the course link and every lesson with its number and title.

Response protocol:
- General knowledge questions: answer from existing knowledge without calling tools
- Course-specific questions: call the appropriate tool first, then answer
- Do not describe your search process or mention the tools; give the answer directly

Keep answers brief and focused. Use examples when they make the answer clearer.";

/// The system prompt, with prior exchanges appended when there are any.
pub fn system_prompt(history: Option<&str>) -> String {
    match history {
        Some(history) if !history.is_empty() => {
            format!("{SYSTEM_PROMPT}\n\nPrevious conversation:\n{history}")
        }
        _ => SYSTEM_PROMPT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_appended_after_marker() {
        let prompt = system_prompt(Some("User: What is Python?\nAssistant: A language."));
        assert!(prompt.starts_with(SYSTEM_PROMPT));
        assert!(prompt.ends_with("Previous conversation:\nUser: What is Python?\nAssistant: A language."));
    }

    #[test]
    fn no_history_leaves_prompt_unchanged() {
        assert_eq!(system_prompt(None), SYSTEM_PROMPT);
        assert_eq!(system_prompt(Some("")), SYSTEM_PROMPT);
    }
}
