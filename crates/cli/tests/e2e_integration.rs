//! End-to-end integration tests for the Syllabus engine.
//!
//! These tests run the full pipeline from course documents on disk through
//! ingestion, both generation rounds and tool dispatch, with a scripted model
//! standing in for the hosted provider.

use std::path::Path;
use std::sync::{Arc, Mutex};

use syllabus_agent::{Generator, IngestSummary, RagSystem, SessionStore};
use syllabus_core::error::ProviderError;
use syllabus_core::event::EventBus;
use syllabus_core::message::{Message, MessageToolCall, Role};
use syllabus_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use syllabus_core::{Source, VectorIndex};
use syllabus_ingest::DocumentProcessor;
use syllabus_retrieval::{CourseStore, FileIndex, HashEmbedder};
use syllabus_tools::course_registry;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence and keeps
/// every request.
struct ScriptedProvider {
    responses: Mutex<Vec<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn tool_then_text(tool_calls: Vec<MessageToolCall>, answer: &str) -> Self {
        Self::new(vec![tool_response(tool_calls), text_response(answer)])
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut responses = self.responses.lock().unwrap();
        let mut requests = self.requests.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted after {} calls", requests.len());
        }
        requests.push(request);
        Ok(responses.remove(0))
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        usage: usage(),
        model: "mock".into(),
        stop_reason: Some("end_turn".into()),
    }
}

fn tool_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    let mut msg = Message::assistant("");
    msg.tool_calls = tool_calls;
    ProviderResponse {
        message: msg,
        usage: usage(),
        model: "mock".into(),
        stop_reason: Some("tool_use".into()),
    }
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

// ── Fixtures ─────────────────────────────────────────────────────────────

const INTRO_TO_X: &str = "Course Title: Intro to X
Course Link: https://example.com/x
Course Instructor: Ada Lovelace

Lesson 0: Welcome
Lesson Link: https://example.com/x/0
Welcome to the course. We will build widgets together and learn the tools.

Lesson 1: Basics
Lesson Link: https://example.com/x/1
This is content from lesson 1 about basic concepts. Dr. Smith explains why the basics matter.
";

const DATA_PIPELINES: &str = "Course Title: Building Data Pipelines
Course Link: https://example.com/pipes
Course Instructor: Grace Hopper

Lesson 1: Streams
Lesson Link: https://example.com/pipes/1
Streams move records between stages. Backpressure keeps fast producers in check.
";

fn write_docs(dir: &Path) {
    std::fs::write(dir.join("intro_to_x.txt"), INTRO_TO_X).unwrap();
    std::fs::write(dir.join("data_pipelines.txt"), DATA_PIPELINES).unwrap();
}

fn file_store(index_dir: &Path) -> Arc<CourseStore> {
    Arc::new(CourseStore::new(
        Arc::new(FileIndex::open(index_dir.join("catalog.jsonl")).unwrap()),
        Arc::new(FileIndex::open(index_dir.join("content.jsonl")).unwrap()),
        Arc::new(HashEmbedder::default()),
    ))
}

fn rag(provider: Arc<ScriptedProvider>, store: Arc<CourseStore>) -> RagSystem {
    let bus = Arc::new(EventBus::default());
    let tools = Arc::new(course_registry(store.clone()));
    let generator = Generator::new(provider, "mock", tools, bus.clone());
    RagSystem::new(DocumentProcessor::default(), store, generator, SessionStore::new(2), bus)
}

async fn ingested(provider: Arc<ScriptedProvider>) -> (RagSystem, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    write_docs(&docs);
    let system = rag(provider, file_store(&dir.path().join("index")));
    let summary = system.add_course_folder(&docs, false).await.unwrap();
    assert_eq!(summary.courses, 2);
    (system, dir)
}

// ── E2E: Retrieval scenarios ─────────────────────────────────────────────

#[tokio::test]
async fn e2e_lesson_search_returns_linked_source() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![tool_call(
            "toolu_1",
            "search_course_content",
            serde_json::json!({"query": "basic concepts", "course_name": "Intro", "lesson_number": 1}),
        )],
        "Lesson 1 introduces the basic concepts.",
    ));
    let (system, _dir) = ingested(provider.clone()).await;

    let response = system.query("What does lesson 1 of Intro cover?", None).await.unwrap();

    assert_eq!(response.answer, "Lesson 1 introduces the basic concepts.");
    assert_eq!(
        response.sources,
        vec![Source::new("Intro to X - Lesson 1", Some("https://example.com/x/1".into()))]
    );

    let requests = provider.requests();
    let tool_msg = &requests[1].messages[3];
    assert_eq!(tool_msg.role, Role::Tool);
    assert!(
        tool_msg
            .content
            .starts_with("[Intro to X - Lesson 1]\nCourse Intro to X Lesson 1 content: ")
    );
}

#[tokio::test]
async fn e2e_unknown_course_is_reported_to_model() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![tool_call(
            "toolu_1",
            "search_course_content",
            serde_json::json!({"query": "anything", "course_name": "Quantum Basket Weaving"}),
        )],
        "I could not find that course.",
    ));
    let (system, _dir) = ingested(provider.clone()).await;

    let response = system.query("Tell me about quantum basket weaving", None).await.unwrap();

    assert!(response.sources.is_empty());
    let chain = &provider.requests()[1].messages;
    assert_eq!(chain[3].content, "No course found matching 'Quantum Basket Weaving'");
}

#[tokio::test]
async fn e2e_round_two_never_offers_tools() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![tool_call(
            "toolu_1",
            "get_course_outline",
            serde_json::json!({"course_name": "Pipelines"}),
        )],
        "The course has one lesson.",
    ));
    let (system, _dir) = ingested(provider.clone()).await;

    let response = system.query("Outline the pipelines course", None).await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools.len(), 2);
    assert!(requests[1].tools.is_empty());
    assert!(requests[1].messages[3].content.starts_with("Course: Building Data Pipelines\n"));
    assert_eq!(
        response.sources,
        vec![Source::new(
            "Building Data Pipelines - Lesson 1",
            Some("https://example.com/pipes/1".into())
        )]
    );
}

#[tokio::test]
async fn e2e_direct_answer_has_no_sources() {
    let provider =
        Arc::new(ScriptedProvider::new(vec![text_response("A widget is a small gadget.")]));
    let (system, _dir) = ingested(provider.clone()).await;

    let response = system.query("What is a widget in general?", None).await.unwrap();

    assert_eq!(response.answer, "A widget is a small gadget.");
    assert!(response.sources.is_empty());
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn e2e_sources_follow_call_order() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![
            tool_call(
                "a",
                "search_course_content",
                serde_json::json!({"query": "basics", "course_name": "Intro to X", "lesson_number": 1}),
            ),
            tool_call(
                "b",
                "search_course_content",
                serde_json::json!({"query": "backpressure", "course_name": "Data Pipelines"}),
            ),
        ],
        "Both courses cover it.",
    ));
    let (system, _dir) = ingested(provider.clone()).await;

    let response = system.query("Compare the two courses", None).await.unwrap();

    let texts: Vec<_> = response.sources.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["Intro to X - Lesson 1", "Building Data Pipelines - Lesson 1"]);

    let chain = &provider.requests()[1].messages;
    assert_eq!(chain[3].tool_call_id.as_deref(), Some("a"));
    assert_eq!(chain[4].tool_call_id.as_deref(), Some("b"));
}

#[tokio::test]
async fn e2e_unknown_capability_is_an_error_value() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![tool_call("x", "delete_all_courses", serde_json::json!({}))],
        "I cannot do that.",
    ));
    let (system, _dir) = ingested(provider.clone()).await;

    let response = system.query("Delete everything", None).await.unwrap();

    assert_eq!(response.answer, "I cannot do that.");
    assert_eq!(
        provider.requests()[1].messages[3].content,
        "Tool 'delete_all_courses' not found"
    );
    assert_eq!(system.course_catalog().await.unwrap().count, 2);
}

// ── E2E: Ingestion ───────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_reingestion_after_restart_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let docs = dir.path().join("docs");
    std::fs::create_dir(&docs).unwrap();
    write_docs(&docs);
    let index_dir = dir.path().join("index");

    let first_ids = {
        let store = file_store(&index_dir);
        let system = rag(Arc::new(ScriptedProvider::new(vec![])), store);
        let summary = system.add_course_folder(&docs, false).await.unwrap();
        assert_eq!(summary.courses, 2);
        assert_eq!(summary.skipped, 0);
        let content = FileIndex::open(index_dir.join("content.jsonl")).unwrap();
        content.ids().await.unwrap()
    };
    assert!(first_ids.contains(&"Intro to X_0".to_string()));

    let store = file_store(&index_dir);
    let system = rag(Arc::new(ScriptedProvider::new(vec![])), store);
    let summary = system.add_course_folder(&docs, false).await.unwrap();
    assert_eq!(
        summary,
        IngestSummary {
            skipped: 2,
            ..IngestSummary::default()
        }
    );

    let content = FileIndex::open(index_dir.join("content.jsonl")).unwrap();
    assert_eq!(content.ids().await.unwrap(), first_ids);
    assert_eq!(
        system.course_catalog().await.unwrap().titles,
        vec!["Building Data Pipelines", "Intro to X"]
    );
}

// ── E2E: Sessions ────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_history_keeps_last_two_exchanges() {
    let provider = Arc::new(ScriptedProvider::new(vec![
        text_response("a1"),
        text_response("a2"),
        text_response("a3"),
        text_response("a4"),
    ]));
    let (system, _dir) = ingested(provider.clone()).await;

    let session = system.query("q1", None).await.unwrap().session_id;
    for q in ["q2", "q3", "q4"] {
        let response = system.query(q, Some(&session)).await.unwrap();
        assert_eq!(response.session_id, session);
    }

    let requests = provider.requests();
    let first_prompt = &requests[0].messages[0].content;
    assert!(!first_prompt.contains("Previous conversation:"));

    let last_prompt = &requests[3].messages[0].content;
    assert!(last_prompt.contains("User: q2\nAssistant: a2\nUser: q3\nAssistant: a3"));
    assert!(!last_prompt.contains("q1"));

    // The stored query is the user's text, not the wrapped prompt
    assert_eq!(
        requests[3].messages[1].content,
        "Answer this question about course materials: q4"
    );
    assert!(!last_prompt.contains("Answer this question"));
}

#[tokio::test]
async fn e2e_sessions_are_isolated() {
    let provider = Arc::new(ScriptedProvider::new(vec![text_response("a1"), text_response("b1")]));
    let (system, _dir) = ingested(provider.clone()).await;

    let first = system.query("from session one", None).await.unwrap();
    let second = system.query("from session two", None).await.unwrap();

    assert_ne!(first.session_id, second.session_id);
    let prompt = &provider.requests()[1].messages[0].content;
    assert!(!prompt.contains("from session one"));
}
