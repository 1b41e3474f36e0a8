//! Serve command handler.

use crate::commands::{build_facade, load_index};
use clap::Args;
use libris_core::{config::AppConfig, AppResult};
use libris_server::AppState;
use std::sync::Arc;

/// Run the HTTP question-answering service
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    pub port: u16,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let index = load_index(config)?;
        let facade = build_facade(config, index.clone())?;

        tracing::info!(
            "Serving {} books ({} chunks) on port {}",
            index.books().len(),
            index.len(),
            self.port
        );

        let state = Arc::new(AppState {
            facade,
            index,
            generation_provider: config.provider.clone(),
            generation_model: config.model.clone(),
        });

        libris_server::serve(state, self.port).await
    }
}
