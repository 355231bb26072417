use thiserror::Error;

use crate::models::{Conversation, ConversationWithMessages, Message, NewMessage, ValidationError};
use crate::services::audio::{decode_audio_blob, AudioClip, AudioError};
use crate::services::database::Database;
use crate::services::summary::{SummaryError, SummaryGateway};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    Audio(#[from] AudioError),
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Storage(err)
    }
}

pub async fn create_conversation(
    db: &Database,
    title: Option<String>,
) -> Result<Conversation, ServiceError> {
    let conversation = Conversation::new(title);
    db.insert_conversation(&conversation).await?;
    tracing::info!(conversation_id = %conversation.id, "conversation created");
    Ok(conversation)
}

/// Load a conversation with every message, oldest first.
pub async fn load_conversation(
    db: &Database,
    id: &str,
) -> Result<ConversationWithMessages, ServiceError> {
    let conversation = db
        .get_conversation(id)
        .await?
        .ok_or(ServiceError::NotFound("conversation"))?;
    let messages = db.list_messages(id).await?;
    Ok(ConversationWithMessages {
        conversation,
        messages,
    })
}

pub async fn update_conversation(
    db: &Database,
    id: &str,
    title: Option<String>,
    summary: Option<Option<String>>,
) -> Result<Conversation, ServiceError> {
    db.update_conversation(id, title, summary)
        .await?
        .ok_or(ServiceError::NotFound("conversation"))
}

/// Validate and store a new message. Not idempotent: each call adds a row.
pub async fn append_message(
    db: &Database,
    conversation_id: &str,
    new_message: NewMessage,
) -> Result<Message, ServiceError> {
    let message = new_message.into_message(conversation_id)?;

    if db.get_conversation(conversation_id).await?.is_none() {
        return Err(ServiceError::NotFound("conversation"));
    }

    db.insert_message(&message).await?;
    tracing::debug!(
        conversation_id,
        message_id = %message.id,
        role = %message.role,
        has_audio = message.audio_blob.is_some(),
        "message appended"
    );
    Ok(message)
}

/// Regenerate the clinical summary and store it, replacing any previous one.
/// Nothing is written when generation fails.
pub async fn summarize_conversation(
    db: &Database,
    gateway: &SummaryGateway,
    id: &str,
) -> Result<String, ServiceError> {
    let loaded = load_conversation(db, id).await?;
    let summary = gateway.summarize(&loaded.messages).await?;
    db.update_conversation(id, None, Some(Some(summary.clone())))
        .await?
        .ok_or(ServiceError::NotFound("conversation"))?;
    Ok(summary)
}

pub async fn message_audio(
    db: &Database,
    conversation_id: &str,
    message_id: &str,
) -> Result<AudioClip, ServiceError> {
    let message = db
        .get_message(conversation_id, message_id)
        .await?
        .ok_or(ServiceError::NotFound("message"))?;
    let blob = message
        .audio_blob
        .as_deref()
        .ok_or(ServiceError::NotFound("audio"))?;
    Ok(decode_audio_blob(blob)?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::providers::MockProvider;

    fn text(role: &str, original: &str) -> NewMessage {
        NewMessage {
            role: Some(role.to_string()),
            original_text: Some(original.to_string()),
            translated_text: Some(original.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_append_and_load() {
        let db = Database::new_in_memory().unwrap();
        let conv = create_conversation(&db, None).await.unwrap();
        assert_eq!(conv.title, "New Conversation");

        append_message(&db, &conv.id, text("doctor", "Hello")).await.unwrap();
        append_message(&db, &conv.id, text("doctor", "Hello")).await.unwrap();

        let loaded = load_conversation(&db, &conv.id).await.unwrap();
        assert_eq!(loaded.messages.len(), 2);
        assert!(loaded.conversation.updated_at > conv.updated_at);
    }

    #[tokio::test]
    async fn test_append_rejects_before_storage() {
        let db = Database::new_in_memory().unwrap();
        let err = append_message(&db, "missing", NewMessage::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::MissingRole)
        ));

        let err = append_message(&db, "missing", text("patient", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("conversation")));
    }

    #[tokio::test]
    async fn test_summary_stored_on_success_only() {
        let db = Database::new_in_memory().unwrap();
        let conv = create_conversation(&db, Some("Visit".to_string())).await.unwrap();
        append_message(&db, &conv.id, text("patient", "I have a rash")).await.unwrap();

        let failing = SummaryGateway::new(Arc::new(MockProvider::new("").fail("down")), "m");
        assert!(summarize_conversation(&db, &failing, &conv.id).await.is_err());
        let loaded = load_conversation(&db, &conv.id).await.unwrap();
        assert!(loaded.conversation.summary.is_none());

        let working = SummaryGateway::new(Arc::new(MockProvider::new("- Rash")), "m");
        let summary = summarize_conversation(&db, &working, &conv.id).await.unwrap();
        assert_eq!(summary, "- Rash");
        let loaded = load_conversation(&db, &conv.id).await.unwrap();
        assert_eq!(loaded.conversation.summary.as_deref(), Some("- Rash"));

        assert!(matches!(
            summarize_conversation(&db, &working, "missing").await,
            Err(ServiceError::NotFound("conversation"))
        ));
    }

    #[tokio::test]
    async fn test_message_audio() {
        let db = Database::new_in_memory().unwrap();
        let conv = create_conversation(&db, None).await.unwrap();
        let recorded = append_message(
            &db,
            &conv.id,
            NewMessage {
                role: Some("patient".to_string()),
                audio_blob: Some("data:audio/webm;base64,AQID".to_string()),
                audio_duration: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let typed = append_message(&db, &conv.id, text("doctor", "ok")).await.unwrap();

        let clip = message_audio(&db, &conv.id, &recorded.id).await.unwrap();
        assert_eq!(clip.data, vec![1, 2, 3]);

        assert!(matches!(
            message_audio(&db, &conv.id, &typed.id).await,
            Err(ServiceError::NotFound("audio"))
        ));
        assert!(matches!(
            message_audio(&db, &conv.id, "nope").await,
            Err(ServiceError::NotFound("message"))
        ));
    }
}
