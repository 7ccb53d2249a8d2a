use crate::core::{BrowserTrait, Config, DelayRange, KeyModifier};
use crate::dom::PageSnapshot;
use crate::errors::{ChatAgentError, Result};
use crate::types::SessionDescriptor;
use crate::utils::pacing;
use tracing::{debug, info, warn};

/// Owns the single browser + page pair of a process.
///
/// `connect` replaces whatever session is active: WhatsApp Web refuses to
/// run in two windows of the same profile, so the old browser is always torn
/// down before a new one is launched.
pub struct SessionManager<B: BrowserTrait> {
    browser: B,
    tab: Option<B::TabHandle>,
    config: Config,
    descriptor: Option<SessionDescriptor>,
}

/// A ready page of the active session, borrowed for one operation.
pub struct Page<'a, B: BrowserTrait> {
    browser: &'a B,
    tab: B::TabHandle,
}

impl<B: BrowserTrait> SessionManager<B> {
    pub fn new(browser: B, config: Config) -> Self {
        Self {
            browser,
            tab: None,
            config,
            descriptor: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn descriptor(&self) -> Option<&SessionDescriptor> {
        self.descriptor.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.browser.is_running() && self.tab.is_some()
    }

    pub async fn connect(&mut self, headless: bool) -> Result<SessionDescriptor> {
        self.teardown().await;

        let mut browser_config = self.config.browser.clone();
        browser_config.headless = headless;

        std::fs::create_dir_all(&browser_config.session_dir)?;

        info!(
            headless,
            session_dir = %browser_config.session_dir.display(),
            "launching browser"
        );
        self.browser.launch(&browser_config).await?;

        let tab = self.browser.first_tab().await?;
        self.tab = Some(tab.clone());

        let page = Page {
            browser: &self.browser,
            tab,
        };

        page.navigate(&browser_config.app_url).await?;
        page.wait_for_navigation(browser_config.navigation_timeout_ms)
            .await?;
        pacing::pause(self.config.pacing.after_navigation).await;

        dismiss_interstitial(&page, &self.config).await;
        pacing::pause(self.config.pacing.after_dialog).await;

        let url = page.url().await?;
        check_host(&browser_config.app_url, &url);

        let descriptor = SessionDescriptor {
            session_id: uuid::Uuid::new_v4().to_string(),
            url,
            session_dir: browser_config.session_dir.clone(),
            headless,
            connected_at: chrono::Utc::now(),
        };
        info!(session_id = %descriptor.session_id, url = %descriptor.url, "session ready");

        self.descriptor = Some(descriptor.clone());
        Ok(descriptor)
    }

    /// The page every operation runs against.
    pub fn page(&self) -> Result<Page<'_, B>> {
        if !self.browser.is_running() {
            return Err(ChatAgentError::NotConnected);
        }
        let tab = self.tab.clone().ok_or(ChatAgentError::PageUnavailable)?;
        Ok(Page {
            browser: &self.browser,
            tab,
        })
    }

    pub async fn disconnect(&mut self) {
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        if self.browser.is_running() {
            debug!("closing previous browser session");
            if let Err(e) = self.browser.close().await {
                warn!(error = %e, "ignoring failure while closing browser");
            }
        }
        self.tab = None;
        self.descriptor = None;
    }
}

impl<'a, B: BrowserTrait> Page<'a, B> {
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.browser.navigate(&self.tab, url).await
    }

    pub async fn wait_for_navigation(&self, timeout_ms: u64) -> Result<()> {
        self.browser.wait_for_navigation(&self.tab, timeout_ms).await
    }

    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.browser.execute_script(&self.tab, script).await
    }

    pub async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        self.browser
            .wait_for_element(&self.tab, selector, timeout_ms)
            .await
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.browser.click(&self.tab, selector, 0).await
    }

    pub async fn click_nth(&self, selector: &str, index: usize) -> Result<()> {
        self.browser.click(&self.tab, selector, index).await
    }

    pub async fn type_text(&self, text: &str) -> Result<()> {
        self.browser.type_text(&self.tab, text).await
    }

    /// Types one character at a time, pausing a random `keystroke` delay after each.
    pub async fn type_like_human(&self, text: &str, keystroke: DelayRange) -> Result<()> {
        let mut buf = [0u8; 4];
        for c in text.chars() {
            self.type_text(c.encode_utf8(&mut buf)).await?;
            pacing::pause(keystroke).await;
        }
        Ok(())
    }

    pub async fn press_key(&self, key: &str) -> Result<()> {
        self.browser.press_key(&self.tab, key).await
    }

    pub async fn press_key_with(&self, key: &str, modifiers: &[KeyModifier]) -> Result<()> {
        self.browser
            .press_key_with_modifiers(&self.tab, key, modifiers)
            .await
    }

    pub async fn url(&self) -> Result<String> {
        self.browser.get_url(&self.tab).await
    }

    /// Parse the current DOM into an owned snapshot.
    pub async fn snapshot(&self) -> Result<PageSnapshot> {
        let html = self.browser.page_html(&self.tab).await?;
        Ok(PageSnapshot::parse(&html))
    }
}

/// Clicks the "Use here" button of the "open in another window" dialog when
/// it is shown. Never fails: a missing dialog is the normal case.
async fn dismiss_interstitial<B: BrowserTrait>(page: &Page<'_, B>, config: &Config) {
    let script = match interstitial_script(config) {
        Ok(script) => script,
        Err(e) => {
            warn!(error = %e, "could not build interstitial script");
            return;
        }
    };

    match page.evaluate(&script).await {
        Ok(value) if value.as_bool() == Some(true) => {
            info!("dismissed 'open in another window' dialog")
        }
        Ok(_) => debug!("no interstitial dialog"),
        Err(e) => debug!(error = %e, "interstitial check failed"),
    }
}

fn interstitial_script(config: &Config) -> Result<String> {
    let buttons = serde_json::to_string(&config.selectors.interstitial_buttons)?;
    let labels = serde_json::to_string(&config.selectors.interstitial_labels)?;
    Ok(format!(
        r#"
            (function() {{
                const labels = {labels};
                const buttons = Array.from(document.querySelectorAll({buttons}));
                const useHere = buttons.find(b =>
                    labels.some(l => (b.textContent || '').includes(l)));
                if (useHere) {{
                    useHere.click();
                    return true;
                }}
                return false;
            }})()
        "#
    ))
}

fn check_host(app_url: &str, page_url: &str) {
    let expected = url::Url::parse(app_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    let actual = url::Url::parse(page_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string));
    if expected.is_some() && expected != actual {
        warn!(expected = ?expected, page_url, "page is not on the application host");
    }
}
