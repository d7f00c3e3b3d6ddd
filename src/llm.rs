#[cfg(feature = "local")]
pub mod local;
pub mod openai;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shown when the provider failed without saying why.
pub const GENERIC_FAILURE: &str =
    "Une erreur est survenue lors de la communication avec l'API.";

// ---------------------------------------------------------------------------
// Chat message helpers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of the conversation sent to the narration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

impl std::fmt::Display for ChatMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: {}", self.role.as_str(), self.content)
    }
}

// ---------------------------------------------------------------------------
// Narration engine
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum EngineError {
    /// The provider answered with a non-success status.
    #[error("provider error {status}: {message}")]
    Provider { status: u16, message: String },
    /// The request never produced a usable answer.
    #[error("transport error: {0}")]
    Transport(String),
}

impl EngineError {
    pub fn status(&self) -> u16 {
        match self {
            EngineError::Provider { status, .. } => *status,
            EngineError::Transport(_) => 500,
        }
    }

    /// What to tell the user: the provider's own message when it gave one.
    pub fn user_message(&self) -> &str {
        let message = match self {
            EngineError::Provider { message, .. } => message.as_str(),
            EngineError::Transport(message) => message.as_str(),
        };
        if message.trim().is_empty() {
            GENERIC_FAILURE
        } else {
            message
        }
    }
}

/// Generates the next narrator turn from the whole conversation.
pub trait NarrationEngine {
    /// Engines that run locally need no credential.
    fn requires_credential(&self) -> bool {
        true
    }

    /// Run one completion, handing each generated chunk to `on_chunk` as it
    /// arrives. Returns the full text once the stream is done.
    fn narrate(
        &mut self,
        messages: &[ChatMessage],
        credential: Option<&str>,
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_serialize_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("Bonjour.")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Bonjour."}"#);
    }

    #[test]
    fn test_display() {
        assert_eq!(ChatMessage::user("Partir.").to_string(), "[user]: Partir.");
    }

    #[test]
    fn test_user_message_prefers_provider_text() {
        let err = EngineError::Provider {
            status: 401,
            message: "Incorrect API key provided".into(),
        };
        assert_eq!(err.status(), 401);
        assert_eq!(err.user_message(), "Incorrect API key provided");
    }

    #[test]
    fn test_user_message_falls_back_to_generic() {
        let err = EngineError::Provider {
            status: 502,
            message: "  ".into(),
        };
        assert_eq!(err.user_message(), GENERIC_FAILURE);
        assert_eq!(EngineError::Transport(String::new()).status(), 500);
    }
}
