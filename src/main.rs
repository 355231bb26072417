use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use medbridge::api::{self, AppState};
use medbridge::config::Config;
use medbridge::providers::{LlmProvider, OpenAiProvider};
use medbridge::services::{Database, SummaryGateway, TranslationGateway};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    tracing::debug!(?config, "configuration loaded");

    let db_path = match &config.database_path {
        Some(path) => path.clone(),
        None => Database::default_path()?,
    };
    tracing::info!("Database: {}", db_path.display());
    let database = Database::open(&db_path).await?;

    let llm = config.llm_settings();
    if llm.api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; translation and summaries will fail");
    }
    tracing::info!("Model: {} via {}", llm.model, llm.base_url);
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(&llm));

    let translator = TranslationGateway::new(provider.clone(), llm.model.clone())
        .with_max_tokens(config.translate_max_tokens)
        .with_default_source_lang(config.default_source_lang.clone());
    let summarizer = SummaryGateway::new(provider, llm.model.clone())
        .with_max_tokens(config.summary_max_tokens);

    let state = AppState::new(database, translator, summarizer)
        .with_max_body_bytes(config.max_body_bytes);

    api::serve(config.bind, state).await
}
