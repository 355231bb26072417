use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const DEFAULT_LANG: &str = "en";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Doctor,
    Patient,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "doctor" => Some(Role::Doctor),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub audio_blob: Option<String>,
    pub audio_duration: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("role is required")]
    MissingRole,

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("originalText or audioBlob is required")]
    EmptyContent,
}

/// Client-supplied fields for appending a message. Everything is optional on
/// the wire so presence can be checked explicitly.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub role: Option<String>,
    pub original_text: Option<String>,
    pub translated_text: Option<String>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub audio_blob: Option<String>,
    pub audio_duration: Option<i64>,
}

impl NewMessage {
    /// Validate presence and build the immutable message row.
    pub fn into_message(self, conversation_id: &str) -> Result<Message, ValidationError> {
        let role_str = self
            .role
            .filter(|r| !r.is_empty())
            .ok_or(ValidationError::MissingRole)?;
        let role = Role::from_str(&role_str).ok_or(ValidationError::UnknownRole(role_str))?;

        let original_text = self.original_text.unwrap_or_default();
        let audio_blob = self.audio_blob.filter(|b| !b.is_empty());
        if original_text.is_empty() && audio_blob.is_none() {
            return Err(ValidationError::EmptyContent);
        }

        Ok(Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role,
            original_text,
            translated_text: self.translated_text.unwrap_or_default(),
            source_lang: self.source_lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
            target_lang: self.target_lang.unwrap_or_else(|| DEFAULT_LANG.to_string()),
            audio_blob,
            audio_duration: self.audio_duration,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_message(role: &str, text: &str) -> NewMessage {
        NewMessage {
            role: Some(role.to_string()),
            original_text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let msg = text_message("doctor", "How are you?")
            .into_message("conv-1")
            .unwrap();
        assert_eq!(msg.conversation_id, "conv-1");
        assert_eq!(msg.role, Role::Doctor);
        assert_eq!(msg.translated_text, "");
        assert_eq!(msg.source_lang, "en");
        assert_eq!(msg.target_lang, "en");
        assert!(msg.audio_blob.is_none());
    }

    #[test]
    fn test_audio_only_message_accepted() {
        let new = NewMessage {
            role: Some("patient".to_string()),
            audio_blob: Some("data:audio/webm;base64,AAAA".to_string()),
            audio_duration: Some(4),
            ..Default::default()
        };
        let msg = new.into_message("conv-1").unwrap();
        assert_eq!(msg.original_text, "");
        assert_eq!(msg.audio_duration, Some(4));
    }

    #[test]
    fn test_empty_content_rejected() {
        let new = NewMessage {
            role: Some("patient".to_string()),
            original_text: Some(String::new()),
            audio_blob: None,
            ..Default::default()
        };
        assert_eq!(
            new.into_message("conv-1").unwrap_err(),
            ValidationError::EmptyContent
        );
    }

    #[test]
    fn test_role_required_and_checked() {
        let missing = NewMessage {
            original_text: Some("hi".to_string()),
            ..Default::default()
        };
        assert_eq!(
            missing.into_message("c").unwrap_err(),
            ValidationError::MissingRole
        );

        let unknown = text_message("nurse", "hi");
        assert_eq!(
            unknown.into_message("c").unwrap_err(),
            ValidationError::UnknownRole("nurse".to_string())
        );
    }

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Patient).unwrap(), "\"patient\"");
        assert_eq!(Role::from_str("doctor"), Some(Role::Doctor));
    }
}
