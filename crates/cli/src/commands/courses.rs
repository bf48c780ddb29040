//! `syllabus courses`: list indexed courses.

use syllabus_config::AppConfig;
use crate::bootstrap;

pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = bootstrap::course_store(&config)?;
    let titles = store.course_titles().await?;

    if titles.is_empty() {
        println!("No courses indexed. Run `syllabus ingest` first.");
        return Ok(());
    }

    println!("{} course(s):", titles.len());
    for title in &titles {
        match store.course_metadata(title).await? {
            Some(course) => println!("  - {} ({} lessons)", course.title, course.lessons.len()),
            None => println!("  - {title}"),
        }
    }

    Ok(())
}
