//! Ingest command handler.
//!
//! Scans a directory of plain-text or markdown books, chunks each one,
//! embeds every chunk, and writes the chunk and embedding stores into the
//! workspace. An optional YAML manifest supplies display titles and color
//! tags; books without a manifest entry get a title derived from the file
//! name.

use clap::Args;
use libris_core::{config::AppConfig, AppError, AppResult};
use libris_corpus::{chunker, embeddings, Book, Chunk, EmbeddingIndex};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Chunk and embed a directory of books
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory containing .txt/.md book files
    #[arg(long)]
    pub dir: PathBuf,

    /// YAML manifest with per-book titles and color tags
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Deserialize, Default)]
struct Manifest {
    #[serde(default)]
    books: HashMap<String, ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    title: Option<String>,
    color: Option<String>,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let manifest = match &self.manifest {
            Some(path) => load_manifest(path)?,
            None => Manifest::default(),
        };

        let sources = collect_sources(&self.dir)?;
        if sources.is_empty() {
            return Err(AppError::Config(format!(
                "No .txt or .md files found under {:?}",
                self.dir
            )));
        }

        let mut books: Vec<Book> = Vec::new();
        let mut chunks: Vec<Chunk> = Vec::new();

        for path in &sources {
            let book_id = slug_from_path(path);
            let entry = manifest.books.get(&book_id);

            let title = entry
                .and_then(|e| e.title.clone())
                .unwrap_or_else(|| title_from_slug(&book_id));
            let color_tag = entry.and_then(|e| e.color.clone());

            let raw_text = std::fs::read_to_string(path)?;
            let boundaries = chunker::detect_chapter_boundaries(&raw_text);
            let book_chunks =
                chunker::chunk(&book_id, &raw_text, &boundaries, &config.chunking)?;

            tracing::info!(
                "Chunked '{}' into {} chunks ({} chapters detected)",
                title,
                book_chunks.len(),
                boundaries.len()
            );

            books.push(Book {
                book_id,
                title,
                color_tag,
            });
            chunks.extend(book_chunks);
        }

        let chunk_total = chunks.len();
        let provider = embeddings::create_provider(&config.embedding)?;
        let index = EmbeddingIndex::build(books, chunks, provider.as_ref()).await?;

        config.ensure_libris_dir()?;
        index.save(&config.chunks_path(), &config.embeddings_path())?;

        if self.json {
            let output = serde_json::json!({
                "books": index.books().len(),
                "chunks": chunk_total,
                "embeddingModel": index.model(),
                "dimensions": index.dimensions(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!(
                "Ingested {} books ({} chunks, {} dims via {})",
                index.books().len(),
                chunk_total,
                index.dimensions(),
                index.model()
            );
        }

        Ok(())
    }
}

fn load_manifest(path: &Path) -> AppResult<Manifest> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read manifest {:?}: {}", path, e)))?;
    serde_yaml::from_str(&contents)
        .map_err(|e| AppError::Config(format!("Failed to parse manifest {:?}: {}", path, e)))
}

/// Find book source files, sorted for deterministic ingest order.
fn collect_sources(dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| AppError::Config(format!("Scan failed: {}", e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        match entry.path().extension().and_then(|e| e.to_str()) {
            Some("txt") | Some("md") => sources.push(entry.into_path()),
            _ => {}
        }
    }
    sources.sort();
    Ok(sources)
}

/// Derive a stable book id from the file name: "The_Embodied Mind.txt"
/// becomes "the-embodied-mind".
fn slug_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("book");

    let mut slug = String::with_capacity(stem.len());
    let mut last_dash = true;
    for c in stem.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn title_from_slug(slug: &str) -> String {
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
