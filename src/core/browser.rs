use crate::core::config::BrowserConfig;
use crate::errors::{ChatAgentError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Keyboard modifiers held while pressing a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyModifier {
    Alt,
    Ctrl,
    Meta,
    Shift,
}

/// The browser engine as consumed by the automation core.
///
/// Implementations drive a real browser (see `browser::ChromeBrowser`) or an
/// in-memory DOM for tests (see `testing::FakeBrowser`).
#[async_trait]
pub trait BrowserTrait: Send + Sync {
    type TabHandle: Clone + Send + Sync;

    /// Launch a new browser process. Any previous process must be closed first.
    async fn launch(&mut self, config: &BrowserConfig) -> Result<()>;

    /// First usable page of the running browser, opening one if none exists.
    async fn first_tab(&self) -> Result<Self::TabHandle>;

    async fn navigate(&self, tab: &Self::TabHandle, url: &str) -> Result<()>;

    /// Wait until the current navigation is done and network activity settles.
    async fn wait_for_navigation(&self, tab: &Self::TabHandle, timeout_ms: u64) -> Result<()>;

    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value>;

    /// Wait up to `timeout_ms` for at least one element matching `selector`.
    async fn wait_for_element(
        &self,
        tab: &Self::TabHandle,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<()>;

    /// Click the `index`-th element (document order) matching `selector`.
    async fn click(&self, tab: &Self::TabHandle, selector: &str, index: usize) -> Result<()>;

    /// Type into whatever element currently has focus.
    async fn type_text(&self, tab: &Self::TabHandle, text: &str) -> Result<()>;

    async fn press_key(&self, tab: &Self::TabHandle, key: &str) -> Result<()>;

    async fn press_key_with_modifiers(
        &self,
        tab: &Self::TabHandle,
        key: &str,
        modifiers: &[KeyModifier],
    ) -> Result<()>;

    async fn get_url(&self, tab: &Self::TabHandle) -> Result<String>;

    /// Serialized HTML of the whole document.
    async fn page_html(&self, tab: &Self::TabHandle) -> Result<String> {
        let value = self
            .execute_script(tab, "document.documentElement.outerHTML")
            .await?;
        value.as_str().map(str::to_string).ok_or_else(|| {
            ChatAgentError::JavaScriptFailed("outerHTML did not return a string".to_string())
        })
    }

    fn is_running(&self) -> bool;

    /// Tear the browser process down.
    async fn close(&mut self) -> Result<()>;
}
