use std::sync::Arc;

use crate::services::{Database, SummaryGateway, TranslationGateway};

pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared handles passed to every handler. Cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub translator: Arc<TranslationGateway>,
    pub summarizer: Arc<SummaryGateway>,
    /// Request body cap; audio blobs arrive inline as base64.
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(
        database: Database,
        translator: TranslationGateway,
        summarizer: SummaryGateway,
    ) -> Self {
        Self {
            database,
            translator: Arc::new(translator),
            summarizer: Arc::new(summarizer),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}
