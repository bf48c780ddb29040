//! `syllabus ingest`: index a folder of course documents.

use std::path::PathBuf;
use std::sync::Arc;
use syllabus_config::AppConfig;
use syllabus_core::event::EventBus;
use crate::bootstrap;

pub async fn run(
    config: AppConfig,
    path: Option<PathBuf>,
    clear: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let dir = path.unwrap_or_else(|| config.docs_path.clone());
    let event_bus = Arc::new(EventBus::default());
    bootstrap::spawn_event_logger(&event_bus);
    let rag = bootstrap::rag_system(&config, bootstrap::provider(&config), event_bus)?;

    println!("Indexing course documents in {}", dir.display());
    let summary = rag.add_course_folder(&dir, clear).await?;

    println!("  Added:   {} course(s), {} chunk(s)", summary.courses, summary.chunks);
    println!("  Skipped: {} already indexed", summary.skipped);
    if summary.failed > 0 {
        println!("  Failed:  {} document(s), see log for details", summary.failed);
    }
    let catalog = rag.course_catalog().await?;
    println!("  Total:   {} course(s) indexed", catalog.count);

    Ok(())
}
