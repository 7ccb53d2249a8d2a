use crate::actions::tools::{ConnectWhatsApp, ListChats, ReadMessages, SendMessage};
use crate::actions::{Action, ActionError, ActionResult};
use crate::client::WhatsAppClient;
use crate::core::BrowserTrait;
use crate::errors::{ChatAgentError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry for agent-facing actions
pub struct ActionRegistry<B: BrowserTrait> {
    actions: HashMap<String, Arc<dyn Action<B>>>,
}

impl<B: BrowserTrait + 'static> ActionRegistry<B> {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Registry holding `connect_whatsapp`, `list_chats`, `read_messages`
    /// and `send_message`.
    pub fn with_whatsapp_tools() -> Self {
        let mut registry = Self::new();
        registry.register(ConnectWhatsApp);
        registry.register(ListChats);
        registry.register(ReadMessages);
        registry.register(SendMessage);
        registry
    }

    /// Register a new action
    pub fn register<A: Action<B> + 'static>(&mut self, action: A) {
        let name = action.name().to_string();
        self.actions.insert(name, Arc::new(action));
    }

    /// Get an action by name
    pub fn get_action(&self, name: &str) -> Option<Arc<dyn Action<B>>> {
        self.actions.get(name).cloned()
    }

    /// Names of all registered actions, sorted
    pub fn list_actions(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Execute an action by name
    pub async fn execute_action(
        &self,
        name: &str,
        params: serde_json::Value,
        client: &mut WhatsAppClient<B>,
    ) -> Result<ActionResult> {
        let action = self.get_action(name).ok_or_else(|| {
            ChatAgentError::ActionError(ActionError::ActionNotFound(name.to_string()))
        })?;

        action.validate_params(&params).map_err(|e| match e {
            ChatAgentError::ActionError(inner) => ChatAgentError::ActionError(inner),
            other => ChatAgentError::ActionError(ActionError::InvalidParameters(other.to_string())),
        })?;

        let start_time = std::time::Instant::now();
        let result = action.execute(params, client).await?;
        let execution_time = start_time.elapsed().as_millis() as u64;
        debug!(action = name, success = result.success, execution_time, "action finished");

        Ok(result.with_execution_time(execution_time))
    }

    /// Get action metadata
    pub fn get_action_metadata(&self, name: &str) -> Option<ActionMetadata> {
        self.get_action(name).map(|action| ActionMetadata::of(action.as_ref()))
    }

    /// Metadata for all actions, sorted by name
    pub fn get_all_metadata(&self) -> Vec<ActionMetadata> {
        self.list_actions()
            .iter()
            .filter_map(|name| self.get_action_metadata(name))
            .collect()
    }
}

impl<B: BrowserTrait + 'static> Default for ActionRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata about an action
#[derive(Debug, Clone, Serialize)]
pub struct ActionMetadata {
    pub name: String,
    pub description: String,
    pub parameter_schema: serde_json::Value,
}

impl ActionMetadata {
    fn of<B: BrowserTrait>(action: &dyn Action<B>) -> Self {
        Self {
            name: action.name().to_string(),
            description: action.description().to_string(),
            parameter_schema: action.parameter_schema(),
        }
    }
}
