//! Ask command handler.

use crate::commands::{build_facade, load_index};
use clap::Args;
use libris_core::{config::AppConfig, AppResult};

/// Ask a one-shot question against the ingested corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Restrict retrieval to a single book id
    #[arg(long)]
    pub book: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = load_index(config)?;
        let facade = build_facade(config, index)?;

        let result = facade
            .answer(&self.question, true, self.book.as_deref())
            .await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&result)?);
            return Ok(());
        }

        println!("{}", result.answer);

        if !result.sources.is_empty() {
            println!();
            println!("Sources:");
            for source in &result.sources {
                match &source.chapter {
                    Some(chapter) => println!(
                        "- {} ({}) [{:.2}]",
                        source.book_title, chapter, source.similarity
                    ),
                    None => println!("- {} [{:.2}]", source.book_title, source.similarity),
                }
            }
        }

        Ok(())
    }
}
