use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Deserializer, Serialize};

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::models::{Conversation, ConversationWithMessages, Language, Message, NewMessage, LANGUAGES};
use crate::services::conversation;
use crate::services::search::{self as search_service, SearchResult};

// --- Request types ---

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateConversationRequest {
    pub title: Option<String>,
    /// Absent keeps the stored summary; an explicit `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub summary: Option<Option<String>>,
}

/// Wrap any present value, `null` included, in `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub text: Option<String>,
    pub target_lang: Option<String>,
    pub source_lang: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

// --- Response types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translated: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// Parse an optional JSON body, treating an empty or malformed body as `{}`.
fn lenient_json<T: for<'de> Deserialize<'de> + Default>(body: &Bytes) -> T {
    if body.is_empty() {
        return T::default();
    }
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!("ignoring unparseable request body: {}", e);
        T::default()
    })
}

fn required_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn languages() -> Json<&'static [Language]> {
    Json(LANGUAGES)
}

pub async fn list_conversations(
    State(state): State<AppState>,
) -> Result<Json<Vec<ConversationWithMessages>>, ApiError> {
    state
        .database
        .list_conversations()
        .await
        .map(Json)
        .map_err(|e| ApiError::internal("Failed to list conversations", e))
}

pub async fn create_conversation(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Conversation>, ApiError> {
    let req: CreateConversationRequest = lenient_json(&body);
    conversation::create_conversation(&state.database, req.title)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(e, "Failed to create conversation"))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ConversationWithMessages>, ApiError> {
    conversation::load_conversation(&state.database, &id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(e, "Failed to fetch conversation"))
}

pub async fn update_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Conversation>, ApiError> {
    let req: UpdateConversationRequest = lenient_json(&body);
    conversation::update_conversation(&state.database, &id, req.title, req.summary)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(e, "Failed to update"))
}

pub async fn append_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<NewMessage>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let new_message = required_json(payload)?;
    conversation::append_message(&state.database, &id, new_message)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_service(e, "Failed to add message"))
}

pub async fn message_audio(
    State(state): State<AppState>,
    Path((id, message_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let clip = conversation::message_audio(&state.database, &id, &message_id)
        .await
        .map_err(|e| ApiError::from_service(e, "Failed to decode audio"))?;
    Ok(([(header::CONTENT_TYPE, clip.mime_type)], clip.data))
}

pub async fn summarize_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary = conversation::summarize_conversation(&state.database, &state.summarizer, &id)
        .await
        .map_err(|e| ApiError::from_service(e, "Summary failed"))?;
    Ok(Json(SummaryResponse { summary }))
}

pub async fn translate(
    State(state): State<AppState>,
    payload: Result<Json<TranslateRequest>, JsonRejection>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let req = required_json(payload)?;
    let (text, target_lang) = match (req.text, req.target_lang) {
        (Some(text), Some(target)) if !text.is_empty() && !target.is_empty() => (text, target),
        _ => return Err(ApiError::BadRequest("text and targetLang required".to_string())),
    };

    let translated = state
        .translator
        .translate(&text, &target_lang, req.source_lang.as_deref())
        .await?;
    Ok(Json(TranslateResponse { translated }))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let q = params.q.unwrap_or_default();
    let results = search_service::search(&state.database, &q).await?;
    Ok(Json(SearchResponse { results }))
}
