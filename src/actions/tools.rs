use crate::actions::base::parse_params;
use crate::actions::{Action, ActionError, ActionResult};
use crate::client::WhatsAppClient;
use crate::core::BrowserTrait;
use crate::errors::Result;
use crate::types::ReadOutcome;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

const DEFAULT_LIMIT: usize = 10;

fn default_limit() -> usize {
    DEFAULT_LIMIT
}

#[derive(Debug, Deserialize)]
struct ConnectParams {
    #[serde(default)]
    headless: bool,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct ReadParams {
    #[serde(rename = "chatName")]
    chat_name: String,
    #[serde(default = "default_limit")]
    limit: usize,
}

#[derive(Debug, Deserialize)]
struct SendParams {
    #[serde(rename = "chatName")]
    chat_name: String,
    message: String,
}

fn require_chat_name(chat_name: &str) -> Result<()> {
    if chat_name.trim().is_empty() {
        return Err(ActionError::InvalidParameters("chatName must not be empty".to_string()).into());
    }
    Ok(())
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<(String, serde_json::Value)> {
    let data = serde_json::to_value(value)?;
    let text = serde_json::to_string_pretty(&data)?;
    Ok((text, data))
}

pub struct ConnectWhatsApp;

#[async_trait]
impl<B: BrowserTrait + 'static> Action<B> for ConnectWhatsApp {
    fn name(&self) -> &str {
        "connect_whatsapp"
    }

    fn description(&self) -> &str {
        "Launch browser and connect to WhatsApp Web. \
         Use this to login or verify if you are already logged in."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "headless": {
                    "type": "boolean",
                    "default": false,
                    "description": "Run browser in headless mode. \
                                    Set to false to scan QR code initially."
                }
            }
        })
    }

    fn validate_params(&self, params: &serde_json::Value) -> Result<()> {
        parse_params::<ConnectParams>(params).map(|_| ())
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        client: &mut WhatsAppClient<B>,
    ) -> Result<ActionResult> {
        let params: ConnectParams = parse_params(&params)?;

        match client.connect(params.headless).await {
            Ok(descriptor) => {
                let data = serde_json::to_value(&descriptor)?;
                Ok(ActionResult::success_with_data(descriptor.status(), data))
            }
            Err(e) => {
                warn!(error = %e, "connect failed");
                Ok(ActionResult::failure(format!("Error connecting: {}", e)))
            }
        }
    }
}

pub struct ListChats;

#[async_trait]
impl<B: BrowserTrait + 'static> Action<B> for ListChats {
    fn name(&self) -> &str {
        "list_chats"
    }

    fn description(&self) -> &str {
        "List recent chats from WhatsApp Web."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {
                    "type": "integer",
                    "minimum": 0,
                    "default": DEFAULT_LIMIT,
                    "description": "Maximum number of chats to return."
                }
            }
        })
    }

    fn validate_params(&self, params: &serde_json::Value) -> Result<()> {
        parse_params::<ListParams>(params).map(|_| ())
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        client: &mut WhatsAppClient<B>,
    ) -> Result<ActionResult> {
        let params: ListParams = parse_params(&params)?;

        match client.list_chats(params.limit).await {
            Ok(chats) => {
                let (text, data) = pretty(&chats)?;
                Ok(ActionResult::success_with_data(text, data))
            }
            Err(e) => {
                warn!(error = %e, "list_chats failed");
                Ok(ActionResult::failure(format!(
                    "Error listing chats: {}. \
                     Ensure you are logged in and 'connect_whatsapp' has been called.",
                    e
                )))
            }
        }
    }
}

pub struct ReadMessages;

#[async_trait]
impl<B: BrowserTrait + 'static> Action<B> for ReadMessages {
    fn name(&self) -> &str {
        "read_messages"
    }

    fn description(&self) -> &str {
        "Read recent messages from a specific chat by its name."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "chatName": {
                    "type": "string",
                    "description": "Exact name of the chat or contact."
                },
                "limit": {
                    "type": "integer",
                    "minimum": 0,
                    "default": DEFAULT_LIMIT,
                    "description": "Number of recent messages to retrieve (max visible)."
                }
            },
            "required": ["chatName"]
        })
    }

    fn validate_params(&self, params: &serde_json::Value) -> Result<()> {
        let params: ReadParams = parse_params(params)?;
        require_chat_name(&params.chat_name)
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        client: &mut WhatsAppClient<B>,
    ) -> Result<ActionResult> {
        let params: ReadParams = parse_params(&params)?;

        match client.read_messages(&params.chat_name, params.limit).await {
            Ok(ReadOutcome::Messages(read)) => {
                let (text, data) = pretty(&read)?;
                Ok(ActionResult::success_with_data(text, data))
            }
            Ok(ReadOutcome::Empty { chat }) => Ok(ActionResult::success(format!(
                "No messages found in chat \"{}\". \
                 If the chat is empty or just opened, try waiting a few seconds.",
                chat
            ))),
            Err(e) => {
                warn!(chat = %params.chat_name, error = %e, "read_messages failed");
                Ok(ActionResult::failure(format!("Error reading messages: {}", e)))
            }
        }
    }
}

pub struct SendMessage;

#[async_trait]
impl<B: BrowserTrait + 'static> Action<B> for SendMessage {
    fn name(&self) -> &str {
        "send_message"
    }

    fn description(&self) -> &str {
        "Select a chat by its exact name and send a message."
    }

    fn parameter_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "chatName": {
                    "type": "string",
                    "description": "Exact name of the chat or contact."
                },
                "message": {
                    "type": "string",
                    "description": "Message content to send."
                }
            },
            "required": ["chatName", "message"]
        })
    }

    fn validate_params(&self, params: &serde_json::Value) -> Result<()> {
        let params: SendParams = parse_params(params)?;
        require_chat_name(&params.chat_name)
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        client: &mut WhatsAppClient<B>,
    ) -> Result<ActionResult> {
        let params: SendParams = parse_params(&params)?;

        match client.send_message(&params.chat_name, &params.message).await {
            Ok(()) => Ok(ActionResult::success(format!(
                "Message sent to \"{}\" successfully.",
                params.chat_name
            ))),
            Err(e) => {
                warn!(chat = %params.chat_name, error = %e, "send_message failed");
                Ok(ActionResult::failure(format!("Error sending message: {}", e)))
            }
        }
    }
}
