//! Sentence-window chunking.
//!
//! Lesson text is normalised, split into sentences, and packed into windows
//! of at most `chunk_size` characters. Consecutive windows share a tail of
//! whole sentences worth at most `chunk_overlap` characters.

use syllabus_core::CourseChunk;

/// Tokens whose trailing period never ends a sentence.
const ABBREVIATIONS: &[&str] = &[
    "Dr", "Mr", "Mrs", "Ms", "Prof", "Sr", "Jr", "St", "vs", "etc", "e.g", "i.e", "Inc", "Ltd",
    "No", "Fig",
];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(800, 100)
    }
}

impl Chunker {
    /// Sizes are in characters.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Chunk one lesson's text. Indices run from `first_index` upward.
    pub fn chunk_lesson(
        &self,
        text: &str,
        course_title: &str,
        lesson_number: Option<u32>,
        first_index: usize,
    ) -> Vec<CourseChunk> {
        let header = context_header(course_title, lesson_number);
        self.windows(text)
            .into_iter()
            .enumerate()
            .map(|(offset, body)| CourseChunk {
                content: format!("{header}{body}"),
                course_title: course_title.to_string(),
                lesson_number,
                chunk_index: first_index + offset,
            })
            .collect()
    }

    /// Window bodies for `text`, without context headers.
    pub fn windows(&self, text: &str) -> Vec<String> {
        let sentences = sentences(text);
        let lens: Vec<usize> = sentences.iter().map(|s| s.chars().count()).collect();
        let n = sentences.len();

        let mut windows = Vec::new();
        let mut i = 0;
        while i < n {
            // The first sentence is always taken, even when oversized
            let mut size = lens[i];
            let mut j = i + 1;
            while j < n && size + 1 + lens[j] <= self.chunk_size {
                size += 1 + lens[j];
                j += 1;
            }
            windows.push(sentences[i..j].join(" "));
            if j == n {
                break;
            }

            let mut carried = 0;
            let mut overlap = 0;
            for len in lens[i..j].iter().rev() {
                let add = if overlap == 0 { *len } else { len + 1 };
                if carried + add > self.chunk_overlap {
                    break;
                }
                carried += add;
                overlap += 1;
            }
            i = (j - overlap).max(i + 1);
        }
        windows
    }
}

/// `"Course {title} Lesson {n} content: "`, or `"Course {title} content: "`
/// for text outside any lesson.
pub fn context_header(course_title: &str, lesson_number: Option<u32>) -> String {
    match lesson_number {
        Some(n) => format!("Course {course_title} Lesson {n} content: "),
        None => format!("Course {course_title} content: "),
    }
}

/// The chunk text with its context header removed.
pub fn strip_header(chunk: &CourseChunk) -> &str {
    let header = context_header(&chunk.course_title, chunk.lesson_number);
    chunk.content.strip_prefix(header.as_str()).unwrap_or(&chunk.content)
}

/// Collapse every whitespace run to one space and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split normalised text into sentences.
///
/// A boundary is `.`, `!` or `?` followed by a space and an uppercase letter
/// or digit. Periods after abbreviations, single-letter initials, and dotted
/// acronyms are not boundaries.
pub fn sentences(text: &str) -> Vec<String> {
    let text = normalize_whitespace(text);
    let chars: Vec<(usize, char)> = text.char_indices().collect();

    let mut out = Vec::new();
    let mut start = 0;
    for w in 0..chars.len() {
        let (pos, c) = chars[w];
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let (Some(&(_, gap)), Some(&(next_pos, next))) = (chars.get(w + 1), chars.get(w + 2)) else {
            continue;
        };
        if gap != ' ' || !(next.is_uppercase() || next.is_ascii_digit()) {
            continue;
        }
        if c == '.' && is_non_terminal(&text[start..pos]) {
            continue;
        }
        let sentence = text[start..pos + c.len_utf8()].trim();
        if !sentence.is_empty() {
            out.push(sentence.to_string());
        }
        start = next_pos;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

/// Whether the word ending right before a period is an abbreviation.
fn is_non_terminal(before: &str) -> bool {
    let token = before.rsplit(' ').next().unwrap_or("");
    let token = token.trim_start_matches(|c: char| !c.is_alphanumeric());
    if token.is_empty() {
        return false;
    }
    if ABBREVIATIONS.contains(&token) {
        return true;
    }

    let mut chars = token.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return c.is_alphabetic() && c.is_uppercase();
    }

    token.contains('.')
        && token
            .split('.')
            .all(|seg| seg.chars().count() == 1 && seg.chars().all(char::is_alphabetic))
}
