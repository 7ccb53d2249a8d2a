use crate::client::WhatsAppClient;
use crate::core::BrowserTrait;
use crate::errors::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Result of an action execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub execution_time_ms: u64,
}

impl ActionResult {
    pub fn success(message: String) -> Self {
        Self {
            success: true,
            message,
            data: None,
            execution_time_ms: 0,
        }
    }

    pub fn success_with_data(message: String, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message,
            data: Some(data),
            execution_time_ms: 0,
        }
    }

    pub fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            data: None,
            execution_time_ms: 0,
        }
    }

    pub fn with_execution_time(mut self, time_ms: u64) -> Self {
        self.execution_time_ms = time_ms;
        self
    }
}

/// Error types for actions
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Action not found: {0}")]
    ActionNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

/// A named operation exposed to the agent host
#[async_trait]
pub trait Action<B: BrowserTrait>: Send + Sync {
    /// Name of the action
    fn name(&self) -> &str;

    /// Description of what the action does
    fn description(&self) -> &str;

    /// JSON schema of the `arguments` object
    fn parameter_schema(&self) -> serde_json::Value;

    /// Run against the shared client. Operational failures are reported in
    /// the returned [`ActionResult`]; `Err` is reserved for bad input.
    async fn execute(
        &self,
        params: serde_json::Value,
        client: &mut WhatsAppClient<B>,
    ) -> Result<ActionResult>;

    /// Validate parameters before execution
    fn validate_params(&self, _params: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

/// Deserialize tool arguments. A missing or `null` object means "all defaults".
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T> {
    let params = if params.is_null() {
        serde_json::Value::Object(Default::default())
    } else {
        params.clone()
    };
    serde_json::from_value(params)
        .map_err(|e| ActionError::InvalidParameters(e.to_string()).into())
}
