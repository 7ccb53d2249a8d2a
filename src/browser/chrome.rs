use crate::core::config::BrowserConfig;
use crate::core::{BrowserTrait, KeyModifier};
use crate::errors::{ChatAgentError, Result};
use async_trait::async_trait;
use headless_chrome::browser::tab::ModifierKey;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Resolves once the document is complete and no new resource entries were
/// recorded for `quietMs`, or after `capMs` at the latest.
const SETTLE_SCRIPT: &str = r#"
    (function(quietMs, capMs) {
        return new Promise((resolve) => {
            const started = Date.now();
            let lastCount = performance.getEntriesByType('resource').length;
            let lastChange = Date.now();
            const tick = () => {
                const count = performance.getEntriesByType('resource').length;
                if (count !== lastCount) {
                    lastCount = count;
                    lastChange = Date.now();
                }
                const quiet = Date.now() - lastChange >= quietMs;
                const capped = Date.now() - started >= capMs;
                if ((document.readyState === 'complete' && quiet) || capped) {
                    resolve({
                        settled: quiet,
                        readyState: document.readyState,
                        url: window.location.href,
                    });
                    return;
                }
                setTimeout(tick, 100);
            };
            tick();
        });
    })(__QUIET__, __CAP__)
"#;

const NETWORK_QUIET_MS: u64 = 500;

/// Chrome browser implementation
pub struct ChromeBrowser {
    browser: Option<Browser>,
}

impl ChromeBrowser {
    pub fn new() -> Self {
        Self { browser: None }
    }

    fn launch_args(config: &BrowserConfig) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-sandbox".to_string(),
            "--disable-setuid-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
        ];

        if let Some(ref ua) = config.user_agent {
            args.push(format!("--user-agent={}", ua));
        }

        args.extend(config.args.iter().cloned());
        args
    }

    fn launch_options<'a>(config: &BrowserConfig, args: &'a [String]) -> Result<LaunchOptions<'a>> {
        LaunchOptions::default_builder()
            .headless(config.headless)
            .user_data_dir(Some(config.session_dir.clone()))
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .idle_browser_timeout(Duration::from_secs(config.idle_timeout_secs))
            .args(args.iter().map(OsStr::new).collect())
            .build()
            .map_err(|e| ChatAgentError::LaunchFailed(e.to_string()))
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser.as_ref().ok_or(ChatAgentError::NotConnected)
    }
}

impl Default for ChromeBrowser {
    fn default() -> Self {
        Self::new()
    }
}

fn to_modifier(modifier: KeyModifier) -> ModifierKey {
    match modifier {
        KeyModifier::Alt => ModifierKey::Alt,
        KeyModifier::Ctrl => ModifierKey::Ctrl,
        KeyModifier::Meta => ModifierKey::Meta,
        KeyModifier::Shift => ModifierKey::Shift,
    }
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    type TabHandle = Arc<Tab>;

    async fn launch(&mut self, config: &BrowserConfig) -> Result<()> {
        let args = Self::launch_args(config);
        let launch_options = Self::launch_options(config, &args)?;

        let browser = Browser::new(launch_options)
            .map_err(|e| ChatAgentError::LaunchFailed(e.to_string()))?;

        self.browser = Some(browser);
        Ok(())
    }

    async fn first_tab(&self) -> Result<Self::TabHandle> {
        let browser = self.browser()?;

        match browser.wait_for_initial_tab() {
            Ok(tab) => Ok(tab),
            Err(e) => {
                debug!(error = %e, "no initial tab, opening a new one");
                browser
                    .new_tab()
                    .map_err(|_| ChatAgentError::PageUnavailable)
            }
        }
    }

    async fn navigate(&self, tab: &Self::TabHandle, url: &str) -> Result<()> {
        tab.navigate_to(url)
            .map_err(|e| ChatAgentError::NavigationFailed(e.to_string()))?;

        Ok(())
    }

    async fn wait_for_navigation(&self, tab: &Self::TabHandle, timeout_ms: u64) -> Result<()> {
        let started = Instant::now();

        tab.wait_until_navigated()
            .map_err(|e| ChatAgentError::NavigationFailed(e.to_string()))?;

        let remaining = timeout_ms.saturating_sub(started.elapsed().as_millis() as u64);
        let script = SETTLE_SCRIPT
            .replace("__QUIET__", &NETWORK_QUIET_MS.to_string())
            .replace("__CAP__", &remaining.to_string());

        let result = tab
            .evaluate(&script, true)
            .map_err(|e| ChatAgentError::JavaScriptFailed(e.to_string()))?;

        debug!(
            settle = ?result.value,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "navigation settled"
        );
        Ok(())
    }

    async fn execute_script(&self, tab: &Self::TabHandle, script: &str) -> Result<Value> {
        let result = tab
            .evaluate(script, false)
            .map_err(|e| ChatAgentError::JavaScriptFailed(e.to_string()))?;

        Ok(result.value.unwrap_or(Value::Null))
    }

    async fn wait_for_element(
        &self,
        tab: &Self::TabHandle,
        selector: &str,
        timeout_ms: u64,
    ) -> Result<()> {
        tab.wait_for_element_with_custom_timeout(selector, Duration::from_millis(timeout_ms))
            .map_err(|e| {
                debug!(selector, error = %e, "wait for element failed");
                ChatAgentError::TargetNotFound {
                    target: selector.to_string(),
                    attempted: vec![selector.to_string()],
                }
            })?;

        Ok(())
    }

    async fn click(&self, tab: &Self::TabHandle, selector: &str, index: usize) -> Result<()> {
        let elements = tab
            .find_elements(selector)
            .map_err(|e| ChatAgentError::InteractionFailed(format!("{}: {}", selector, e)))?;

        let element = elements.get(index).ok_or_else(|| {
            ChatAgentError::InteractionFailed(format!(
                "{} has {} matches, cannot click #{}",
                selector,
                elements.len(),
                index
            ))
        })?;

        element
            .click()
            .map_err(|e| ChatAgentError::InteractionFailed(e.to_string()))?;

        Ok(())
    }

    async fn type_text(&self, tab: &Self::TabHandle, text: &str) -> Result<()> {
        tab.type_str(text)
            .map_err(|e| ChatAgentError::InteractionFailed(e.to_string()))?;
        Ok(())
    }

    async fn press_key(&self, tab: &Self::TabHandle, key: &str) -> Result<()> {
        tab.press_key(key)
            .map_err(|e| ChatAgentError::InteractionFailed(e.to_string()))?;
        Ok(())
    }

    async fn press_key_with_modifiers(
        &self,
        tab: &Self::TabHandle,
        key: &str,
        modifiers: &[KeyModifier],
    ) -> Result<()> {
        let modifiers: Vec<ModifierKey> = modifiers.iter().copied().map(to_modifier).collect();
        tab.press_key_with_modifiers(key, Some(&modifiers))
            .map_err(|e| ChatAgentError::InteractionFailed(e.to_string()))?;
        Ok(())
    }

    async fn get_url(&self, tab: &Self::TabHandle) -> Result<String> {
        Ok(tab.get_url())
    }

    fn is_running(&self) -> bool {
        self.browser.is_some()
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the handle kills the Chrome process.
        self.browser = None;
        Ok(())
    }
}
