//! `syllabus onboard`: first-time setup.

use std::path::PathBuf;
use syllabus_config::AppConfig;

pub async fn run(config_path: Option<&PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path.cloned().unwrap_or_else(AppConfig::config_path);

    println!("Syllabus: first-time setup");
    println!("==========================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    let config = if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        AppConfig::load_from(&config_path)?
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
        AppConfig::default()
    };

    if !config.docs_path.exists() {
        std::fs::create_dir_all(&config.docs_path)?;
        println!("✅ Created docs folder: {}", config.docs_path.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Set ANTHROPIC_API_KEY or add api_key to {}", config_path.display());
    println!("   2. Put course documents (.txt) in {}", config.docs_path.display());
    println!("   3. Run: syllabus ingest");
    println!("   4. Run: syllabus ask \"What does lesson 1 cover?\"\n");

    Ok(())
}
