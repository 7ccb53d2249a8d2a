use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const UNKNOWN_TITLE: &str = "Unknown";
pub const NO_CHATS_TITLE: &str = "No chats found";
pub const NO_CHATS_HINT: &str = "Check that chats are loaded in WhatsApp Web";

/// One row of the chat sidebar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub title: String,
    #[serde(rename = "lastMsg")]
    pub last_message_preview: String,
}

impl ChatSummary {
    pub fn new(title: impl Into<String>, last_message_preview: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            last_message_preview: last_message_preview.into(),
        }
    }

    /// Sentinel returned when no chat-row container could be found at all.
    pub fn no_chats_found() -> Self {
        Self::new(NO_CHATS_TITLE, NO_CHATS_HINT)
    }

    pub fn is_sentinel(&self) -> bool {
        self.title == NO_CHATS_TITLE && self.last_message_preview == NO_CHATS_HINT
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessages {
    pub chat: String,
    pub messages: Vec<MessageRecord>,
}

/// Result of reading a chat. An empty chat is a valid answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Messages(ChatMessages),
    Empty { chat: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub url: String,
    pub session_dir: PathBuf,
    pub headless: bool,
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

impl SessionDescriptor {
    pub fn status(&self) -> String {
        format!(
            "Browser launched. Session restored from {}/. URL: {}",
            self.session_dir.display().to_string().trim_end_matches('/'),
            self.url
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveFailure {
    SearchInputNotFound,
}

impl From<ResolveFailure> for crate::errors::ChatAgentError {
    fn from(failure: ResolveFailure) -> Self {
        match failure {
            ResolveFailure::SearchInputNotFound => Self::SearchInputNotFound,
        }
    }
}

/// How an attempt to open a chat ended.
///
/// `confirmed` is false only when the Enter fallback was used and the
/// header did not show the requested chat afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOutcome {
    Opened { already_open: bool, confirmed: bool },
    Failed(ResolveFailure),
}

impl InteractionOutcome {
    /// False only for an Enter-fallback open whose header did not match.
    pub fn is_confirmed(&self) -> bool {
        matches!(self, InteractionOutcome::Opened { confirmed: true, .. })
    }

    pub fn into_result(self) -> crate::errors::Result<Self> {
        match self {
            InteractionOutcome::Failed(reason) => Err(reason.into()),
            opened => Ok(opened),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_summary_serializes_with_wire_names() {
        let json = serde_json::to_value(ChatSummary::new("Alice", "see you")).unwrap();
        assert_eq!(json, serde_json::json!({ "title": "Alice", "lastMsg": "see you" }));
    }

    #[test]
    fn status_mentions_launch_and_url() {
        let descriptor = SessionDescriptor {
            session_id: "id".to_string(),
            url: "https://web.whatsapp.com/".to_string(),
            session_dir: PathBuf::from("./whatsapp_session"),
            headless: false,
            connected_at: chrono::Utc::now(),
        };
        assert_eq!(
            descriptor.status(),
            "Browser launched. Session restored from ./whatsapp_session/. \
             URL: https://web.whatsapp.com/"
        );
    }

    #[test]
    fn failed_outcome_becomes_error() {
        let outcome = InteractionOutcome::Failed(ResolveFailure::SearchInputNotFound);
        assert!(matches!(
            outcome.into_result(),
            Err(crate::errors::ChatAgentError::SearchInputNotFound)
        ));
    }
}
