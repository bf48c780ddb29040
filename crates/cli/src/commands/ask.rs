//! `syllabus ask`: single-question or interactive mode.

use std::io::Write;
use std::sync::Arc;
use syllabus_agent::{QueryResponse, RagSystem};
use syllabus_config::AppConfig;
use syllabus_core::error::{Error, ProviderError};
use syllabus_core::event::EventBus;
use tokio::io::{AsyncBufReadExt, BufReader};
use crate::bootstrap;

pub async fn run(
    config: AppConfig,
    question: Option<String>,
    session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    // Check for API key early and give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    SYLLABUS_API_KEY=sk-ant-...");
        eprintln!("    ANTHROPIC_API_KEY=sk-ant-...");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let event_bus = Arc::new(EventBus::default());
    bootstrap::spawn_event_logger(&event_bus);
    let rag = bootstrap::rag_system(&config, bootstrap::provider(&config), event_bus)?;

    if let Some(question) = question {
        let response = rag
            .query(&question, session.as_deref())
            .await
            .map_err(describe_failure)?;
        print_response(&response);
        return Ok(());
    }

    interactive(&rag, &config, session).await
}

async fn interactive(
    rag: &RagSystem,
    config: &AppConfig,
    mut session: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = rag.course_catalog().await?;
    println!();
    println!("  Syllabus: interactive mode");
    println!("  Model:    {}", config.model);
    println!("  Courses:  {} indexed", catalog.count);
    println!();
    println!("  Type your question and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        match rag.query(line, session.as_deref()).await {
            Ok(response) => {
                println!();
                print_response(&response);
                session = Some(response.session_id);
            }
            Err(e) => eprintln!("  {}", describe_failure(e)),
        }
        println!();
    }

    Ok(())
}

fn print_response(response: &QueryResponse) {
    for line in response.answer.lines() {
        println!("  Assistant > {line}");
    }
    if !response.sources.is_empty() {
        println!();
        println!("  Sources:");
        for source in &response.sources {
            match &source.link {
                Some(link) => println!("    - {} ({link})", source.text),
                None => println!("    - {}", source.text),
            }
        }
    }
    println!();
    println!("  Session: {}", response.session_id);
}

/// User-facing failure text. Generation faults hide provider detail.
fn describe_failure(e: Error) -> String {
    match e {
        Error::Provider(inner) => {
            tracing::debug!(error = %inner, "Generation failed");
            match inner {
                ProviderError::AuthenticationFailed(_) => {
                    "Query failed: the model provider rejected the API key".into()
                }
                ProviderError::Timeout(_) => {
                    "Query failed: the request timed out".into()
                }
                _ => "Query failed: the model provider returned an error".into(),
            }
        }
        other => format!("Query failed: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syllabus_core::error::ToolError;

    #[test]
    fn provider_faults_are_summarised() {
        let msg = describe_failure(Error::Provider(ProviderError::ApiError {
            status_code: 529,
            message: "overloaded: internal detail".into(),
        }));
        assert_eq!(msg, "Query failed: the model provider returned an error");
        assert!(!msg.contains("internal detail"));
    }

    #[test]
    fn timeouts_are_named() {
        let msg = describe_failure(Error::Provider(ProviderError::Timeout("60s".into())));
        assert_eq!(msg, "Query failed: the request timed out");
    }

    #[test]
    fn other_errors_keep_their_message() {
        let msg = describe_failure(Error::Tool(ToolError::NotFound("x".into())));
        assert!(msg.starts_with("Query failed: Tool error:"));
    }
}
