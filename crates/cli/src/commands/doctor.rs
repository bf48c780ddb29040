//! `syllabus doctor`: diagnose configuration and index health.

use std::path::PathBuf;
use syllabus_config::{AppConfig, IndexBackend};
use syllabus_core::Provider;
use syllabus_ingest::course_documents;
use crate::bootstrap;

pub async fn run(config_path: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Syllabus Doctor: system diagnostics");
    println!("===================================\n");

    let mut issues = 0;

    let path = config_path.cloned().unwrap_or_else(AppConfig::config_path);
    if !path.exists() {
        println!(
            "  ⚠️  No config file at {}, using defaults (run `syllabus onboard`)",
            path.display()
        );
    }
    let config = match AppConfig::load_with_env(&path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
        match bootstrap::provider(&config).health_check().await {
            Ok(true) => println!("  ✅ Anthropic API accepted the key"),
            Ok(false) => {
                println!("  ❌ Anthropic API rejected the key");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Anthropic API unreachable: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ❌ No API key: set SYLLABUS_API_KEY or ANTHROPIC_API_KEY");
        issues += 1;
    }
    println!("  ✅ Model: {}", config.model);

    match course_documents(&config.docs_path) {
        Ok(docs) if docs.is_empty() => {
            println!("  ⚠️  No course documents in {}", config.docs_path.display());
            issues += 1;
        }
        Ok(docs) => println!(
            "  ✅ {} course document(s) in {}",
            docs.len(),
            config.docs_path.display()
        ),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    if config.retrieval.backend == IndexBackend::File {
        println!("  ✅ Index directory: {}", config.retrieval.index_dir().display());
    } else {
        println!("  ⚠️  In-memory index: courses are lost on exit");
    }

    let store = match bootstrap::course_store(&config) {
        Ok(store) => store,
        Err(e) => {
            println!("  ❌ Index or embedder unavailable: {e}");
            println!("\n  ⚠️  {} issue(s) found. See above for details.", issues + 1);
            return Ok(());
        }
    };
    println!("  ✅ Embedder: {}", store.embedder_name());
    match store.course_count().await {
        Ok(0) => {
            println!("  ⚠️  No courses indexed, run `syllabus ingest`");
            issues += 1;
        }
        Ok(n) => println!("  ✅ {n} course(s) indexed"),
        Err(e) => {
            println!("  ❌ Index unreadable: {e}");
            issues += 1;
        }
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
