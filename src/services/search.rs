//! Keyword search over the whole conversation history.
//!
//! Every query loads the full corpus and scans it linearly. A message matches
//! when its original and translated text, joined by a space and lowercased,
//! contain the lowercased query. Each hit carries the neighbouring messages of
//! the same conversation as context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::database::Database;
use crate::models::{ConversationWithMessages, Message, Role};

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search query is empty")]
    EmptyQuery,

    #[error("search failed: {0:#}")]
    Storage(anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub conversation_id: String,
    pub conversation_title: String,
    pub matches: Vec<SearchMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMatch {
    pub message_id: String,
    pub role: Role,
    pub original_text: String,
    pub translated_text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_after: Option<String>,
}

/// Trim and lowercase a raw query, rejecting blank input.
pub fn normalize_query(raw: &str) -> Result<String, SearchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    Ok(trimmed.to_lowercase())
}

/// Validate the query, load the corpus and scan it.
pub async fn search(db: &Database, raw_query: &str) -> Result<Vec<SearchResult>, SearchError> {
    let query = normalize_query(raw_query)?;
    let corpus = db.load_corpus().await.map_err(SearchError::Storage)?;
    let results = search_corpus(&query, &corpus);
    tracing::debug!(
        query = %query,
        conversations = corpus.len(),
        hits = results.len(),
        "search completed"
    );
    Ok(results)
}

/// Scan `corpus` for `query`, which must already be normalized.
pub fn search_corpus(query: &str, corpus: &[ConversationWithMessages]) -> Vec<SearchResult> {
    corpus
        .iter()
        .filter_map(|entry| {
            let matches = match_messages(query, &entry.messages);
            if matches.is_empty() {
                None
            } else {
                Some(SearchResult {
                    conversation_id: entry.conversation.id.clone(),
                    conversation_title: entry.conversation.title.clone(),
                    matches,
                })
            }
        })
        .collect()
}

fn match_messages(query: &str, messages: &[Message]) -> Vec<SearchMatch> {
    messages
        .iter()
        .enumerate()
        .filter(|(_, m)| message_matches(query, m))
        .map(|(i, m)| SearchMatch {
            message_id: m.id.clone(),
            role: m.role,
            original_text: m.original_text.clone(),
            translated_text: m.translated_text.clone(),
            created_at: m.created_at,
            context_before: i
                .checked_sub(1)
                .and_then(|prev| messages.get(prev))
                .map(context_line),
            context_after: messages.get(i + 1).map(context_line),
        })
        .collect()
}

fn message_matches(query: &str, message: &Message) -> bool {
    format!("{} {}", message.original_text, message.translated_text)
        .to_lowercase()
        .contains(query)
}

fn context_line(message: &Message) -> String {
    format!("{}: {}", message.role, message.original_text)
}
