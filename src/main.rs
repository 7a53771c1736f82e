use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use text2deck::client::{self, GenerationClient};
use text2deck::config::Config;
use text2deck::export;
use text2deck::session::DeckSession;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    let input_path = find_input_file(Path::new(&config.input_folder))?;
    // Plain text or markdown, ingested verbatim.
    let input_text = fs::read_to_string(&input_path)
        .with_context(|| format!("Failed to read {input_path:?}"))?;
    println!(
        "Input: {:?} ({} chars)",
        input_path,
        input_text.chars().count()
    );

    let client: Arc<dyn GenerationClient> = client::create_client(&config)?.into();
    let mut session = DeckSession::new(&config, client)?;

    println!(
        "Planning outline ({} slides)...",
        config.effective_slide_count()
    );
    session
        .generate_outline(&input_text, config.effective_slide_count())
        .await?;
    for slide in session.slides() {
        println!("  {}. {}", slide.id, slide.title);
    }

    println!("Generating slide images...");
    // A halted chain still leaves the completed slides exportable; rerun
    // after the backend recovers to finish the rest.
    if let Err(e) = session.start_session().await {
        eprintln!("Generation halted: {e}");
    }

    let pages = export::export_deck(Path::new(&config.output_folder), session.slides())?;
    let rendered = session
        .slides()
        .iter()
        .filter(|s| s.generated_image.is_some())
        .count();
    println!(
        "Deck exported: {} pages ({} rendered) in {}",
        pages.len(),
        rendered,
        config.output_folder
    );

    Ok(())
}

/// First `.txt` or `.md` file in the input folder, sorted by name.
fn find_input_file(dir: &Path) -> Result<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read input folder {dir:?}"))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .map_or(false, |ext| ext == "txt" || ext == "md")
        })
        .collect();
    entries.sort();
    entries
        .into_iter()
        .next()
        .with_context(|| format!("No .txt or .md file found in {dir:?}"))
}
