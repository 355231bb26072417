use base64::Engine;
use thiserror::Error;

/// Recorder output format when the stored blob does not name one.
pub const DEFAULT_AUDIO_MIME: &str = "audio/webm";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    #[error("data URL is not base64-encoded")]
    NotBase64,

    #[error("invalid base64 audio payload: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Decode a stored audio blob, either `data:<mime>[;params];base64,<payload>`
/// or bare base64.
pub fn decode_audio_blob(blob: &str) -> Result<AudioClip, AudioError> {
    let (mime_type, payload) = match blob.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest.split_once(',').ok_or(AudioError::NotBase64)?;
            let mut parts = header.split(';');
            let mime = parts.next().unwrap_or_default().trim();
            if !parts.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
                return Err(AudioError::NotBase64);
            }
            let mime = if mime.is_empty() { DEFAULT_AUDIO_MIME } else { mime };
            (mime.to_string(), payload)
        }
        None => (DEFAULT_AUDIO_MIME.to_string(), blob),
    };

    let data = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| AudioError::Decode(e.to_string()))?;

    Ok(AudioClip { mime_type, data })
}
