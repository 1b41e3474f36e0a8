//! Books command handler.

use crate::commands::load_index;
use clap::Args;
use libris_core::{config::AppConfig, AppResult};

/// List the ingested books
#[derive(Args, Debug)]
pub struct BooksCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl BooksCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = load_index(config)?;

        if self.json {
            let books: Vec<serde_json::Value> = index
                .books()
                .iter()
                .map(|b| {
                    serde_json::json!({
                        "bookId": b.book_id,
                        "title": b.title,
                        "colorTag": b.color_tag,
                        "chunks": index.chunk_count(&b.book_id),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&books)?);
            return Ok(());
        }

        println!("{} books, {} chunks total", index.books().len(), index.len());
        for book in index.books() {
            println!(
                "- {} ({}): {} chunks",
                book.title,
                book.book_id,
                index.chunk_count(&book.book_id)
            );
        }

        Ok(())
    }
}
