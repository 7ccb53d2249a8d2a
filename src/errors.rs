use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatAgentError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Browser not initialized. Call connect_whatsapp first.")]
    NotConnected,

    #[error("Page not initialized.")]
    PageUnavailable,

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("No selector matched for {target} (tried: {})", attempted.join(" | "))]
    TargetNotFound {
        target: String,
        attempted: Vec<String>,
    },

    #[error("Search input not found. Make sure WhatsApp Web is loaded.")]
    SearchInputNotFound,

    #[error("Chat sidebar did not load. Make sure you are logged in to WhatsApp Web.")]
    SidebarNotReady,

    #[error("Message input not found after opening chat.")]
    MessageInputNotFound,

    #[error("Could not confirm that chat \"{0}\" is open; the header shows a different chat.")]
    ChatNotOpened(String),

    #[error("Chat name must not be empty.")]
    EmptyChatName,

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Interaction failed: {0}")]
    InteractionFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Action error: {0}")]
    ActionError(#[from] crate::actions::ActionError),

    #[error("Chrome error: {0}")]
    ChromeError(String),
}

pub type Result<T> = std::result::Result<T, ChatAgentError>;

impl ChatAgentError {
    pub fn is_target_not_found(&self) -> bool {
        matches!(self, ChatAgentError::TargetNotFound { .. })
    }
}
