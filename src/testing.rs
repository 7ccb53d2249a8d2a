//! In-memory browser and WhatsApp Web page fixtures.
//!
//! [`FakeBrowser`] answers selector queries against a static HTML document
//! with `scraper` and records every interaction, so the session, resolver
//! and tool layers can be exercised without Chrome.

use crate::core::config::BrowserConfig;
use crate::core::{BrowserTrait, KeyModifier};
use crate::errors::{ChatAgentError, Result};
use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const INITIAL_URL: &str = "https://web.whatsapp.com/";

/// Everything the fake browser was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Launch { headless: bool },
    Close,
    Navigate(String),
    Wait { selector: String },
    Click { selector: String, index: usize },
    Type(String),
    Key(String),
    KeyCombo { key: String, modifiers: Vec<KeyModifier> },
}

#[derive(Debug, Default)]
struct FakeState {
    html: String,
    url: String,
    running: bool,
    active_sessions: usize,
    max_concurrent_sessions: usize,
    fail_launch: bool,
    fail_next_close: bool,
    without_tabs: bool,
    events: Vec<FakeEvent>,
    scripts: Vec<String>,
    key_reactions: Vec<(String, String)>,
    click_reactions: Vec<(String, usize, String)>,
}

/// Cloneable handle; clones share state so a test keeps one for inspection
/// while the session owns another.
#[derive(Debug, Clone)]
pub struct FakeBrowser {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBrowser {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                html: html.into(),
                url: INITIAL_URL.to_string(),
                ..Default::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the rendered document.
    pub fn set_html(&self, html: impl Into<String>) {
        self.state().html = html.into();
    }

    pub fn fail_launch(&self) {
        self.state().fail_launch = true;
    }

    /// The next `close` reports an error, but the process is still gone.
    pub fn fail_next_close(&self) {
        self.state().fail_next_close = true;
    }

    /// The browser starts but never exposes a page.
    pub fn without_tabs(&self) {
        self.state().without_tabs = true;
    }

    /// After the next press of `key`, the page renders `html`.
    pub fn on_key(&self, key: &str, html: &str) {
        self.state()
            .key_reactions
            .push((key.to_string(), html.to_string()));
    }

    /// After the next click on `selector` at `index`, the page renders `html`.
    pub fn on_click(&self, selector: &str, index: usize, html: &str) {
        self.state()
            .click_reactions
            .push((selector.to_string(), index, html.to_string()));
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.state().events.clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.state().scripts.clone()
    }

    pub fn active_sessions(&self) -> usize {
        self.state().active_sessions
    }

    pub fn max_concurrent_sessions(&self) -> usize {
        self.state().max_concurrent_sessions
    }

    pub fn navigations(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Navigate(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn launched_headless(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Launch { headless } => Some(headless),
                _ => None,
            })
            .collect()
    }

    pub fn waited_selectors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Wait { selector } => Some(selector),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<(String, usize)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Click { selector, index } => Some((selector, index)),
                _ => None,
            })
            .collect()
    }

    /// Plain key presses, without modifier combos.
    pub fn keys(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Key(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Runs of consecutive typed text. Any other event ends a run.
    pub fn typed_segments(&self) -> Vec<String> {
        let mut segments = vec![];
        let mut current: Option<String> = None;
        for event in self.events() {
            match event {
                FakeEvent::Type(text) => {
                    current.get_or_insert_with(String::new).push_str(&text)
                }
                _ => segments.extend(current.take()),
            }
        }
        segments.extend(current);
        segments
    }

    fn matches(&self, selector: &str) -> Result<usize> {
        let sel = Selector::parse(selector).map_err(|e| {
            ChatAgentError::InteractionFailed(format!("invalid selector {selector}: {e:?}"))
        })?;
        let document = Html::parse_document(&self.state().html);
        let count = document.select(&sel).count();
        Ok(count)
    }
}

#[async_trait]
impl BrowserTrait for FakeBrowser {
    type TabHandle = usize;

    async fn launch(&mut self, config: &BrowserConfig) -> Result<()> {
        let mut state = self.state();
        if state.fail_launch {
            return Err(ChatAgentError::LaunchFailed(
                "chrome executable not found".to_string(),
            ));
        }
        state.events.push(FakeEvent::Launch {
            headless: config.headless,
        });
        state.running = true;
        state.active_sessions += 1;
        state.max_concurrent_sessions = state.max_concurrent_sessions.max(state.active_sessions);
        Ok(())
    }

    async fn first_tab(&self) -> Result<usize> {
        if self.state().without_tabs {
            return Err(ChatAgentError::PageUnavailable);
        }
        Ok(0)
    }

    async fn navigate(&self, _tab: &usize, url: &str) -> Result<()> {
        let mut state = self.state();
        state.events.push(FakeEvent::Navigate(url.to_string()));
        state.url = url.to_string();
        Ok(())
    }

    async fn wait_for_navigation(&self, _tab: &usize, _timeout_ms: u64) -> Result<()> {
        Ok(())
    }

    async fn execute_script(&self, _tab: &usize, script: &str) -> Result<Value> {
        let mut state = self.state();
        state.scripts.push(script.to_string());
        if script.contains("outerHTML") {
            Ok(Value::String(state.html.clone()))
        } else {
            Ok(Value::Bool(false))
        }
    }

    async fn wait_for_element(
        &self,
        _tab: &usize,
        selector: &str,
        _timeout_ms: u64,
    ) -> Result<()> {
        self.state().events.push(FakeEvent::Wait {
            selector: selector.to_string(),
        });
        if self.matches(selector)? > 0 {
            Ok(())
        } else {
            Err(ChatAgentError::InteractionFailed(format!(
                "timed out waiting for {selector}"
            )))
        }
    }

    async fn click(&self, _tab: &usize, selector: &str, index: usize) -> Result<()> {
        if self.matches(selector)? <= index {
            return Err(ChatAgentError::InteractionFailed(format!(
                "no element {index} for {selector}"
            )));
        }

        let mut state = self.state();
        state.events.push(FakeEvent::Click {
            selector: selector.to_string(),
            index,
        });
        if let Some(pos) = state
            .click_reactions
            .iter()
            .position(|(s, i, _)| s == selector && *i == index)
        {
            let (_, _, html) = state.click_reactions.remove(pos);
            state.html = html;
        }
        Ok(())
    }

    async fn type_text(&self, _tab: &usize, text: &str) -> Result<()> {
        self.state().events.push(FakeEvent::Type(text.to_string()));
        Ok(())
    }

    async fn press_key(&self, _tab: &usize, key: &str) -> Result<()> {
        let mut state = self.state();
        state.events.push(FakeEvent::Key(key.to_string()));
        if let Some(pos) = state.key_reactions.iter().position(|(k, _)| k == key) {
            let (_, html) = state.key_reactions.remove(pos);
            state.html = html;
        }
        Ok(())
    }

    async fn press_key_with_modifiers(
        &self,
        _tab: &usize,
        key: &str,
        modifiers: &[KeyModifier],
    ) -> Result<()> {
        self.state().events.push(FakeEvent::KeyCombo {
            key: key.to_string(),
            modifiers: modifiers.to_vec(),
        });
        Ok(())
    }

    async fn get_url(&self, _tab: &usize) -> Result<String> {
        Ok(self.state().url.clone())
    }

    fn is_running(&self) -> bool {
        self.state().running
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state();
        state.events.push(FakeEvent::Close);
        state.running = false;
        state.active_sessions = state.active_sessions.saturating_sub(1);
        if state.fail_next_close {
            state.fail_next_close = false;
            return Err(ChatAgentError::ChromeError(
                "connection closed before close acknowledged".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTML shaped like the parts of WhatsApp Web the selector table targets.
pub mod fixtures {
    /// One message bubble of [`conversation`].
    #[derive(Debug, Clone)]
    pub struct FixtureMessage {
        pub outgoing: bool,
        pub sender: String,
        pub time: String,
        pub text: String,
    }

    impl FixtureMessage {
        pub fn incoming(sender: &str, time: &str, text: &str) -> Self {
            Self {
                outgoing: false,
                sender: sender.to_string(),
                time: time.to_string(),
                text: text.to_string(),
            }
        }

        pub fn outgoing(sender: &str, time: &str, text: &str) -> Self {
            Self {
                outgoing: true,
                ..Self::incoming(sender, time, text)
            }
        }
    }

    pub fn escape(value: &str) -> String {
        value
            .replace('&', "&amp;")
            .replace('"', "&quot;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
    }

    /// Logged-in app: sidebar with search box and chat list, plus an
    /// optional open conversation built with [`conversation`].
    pub fn logged_in_page(chats: &[(&str, &str)], conversation: Option<&str>) -> String {
        let rows: String = chats
            .iter()
            .map(|(title, preview)| {
                format!(
                    concat!(
                        r#"<div role="listitem"><div><span dir="auto" title="{t}">{b}</span>"#,
                        r#"<span>10:00</span></div><div><span dir="ltr">{p}</span></div></div>"#,
                    ),
                    t = escape(title),
                    b = escape(title),
                    p = escape(preview),
                )
            })
            .collect();

        format!(
            r#"<html><head><title>WhatsApp</title></head><body><div id="app">
<div id="side"><div><div contenteditable="true" data-tab="3"></div></div>
<div id="pane-side"><div aria-label="Chat list">{rows}</div></div></div>
{main}
</div></body></html>"#,
            main = conversation.unwrap_or("")
        )
    }

    /// The `#main` conversation pane with a header, rows and a compose box.
    pub fn conversation(title: &str, messages: &[FixtureMessage]) -> String {
        let rows: String = messages
            .iter()
            .map(|m| {
                format!(
                    concat!(
                        r#"<div role="row"><div class="{class} focusable-list-item">"#,
                        r#"<div data-pre-plain-text="[{time}] {sender}: ">"#,
                        r#"<span class="selectable-text copyable-text"><span>{text}</span></span>"#,
                        r#"</div></div></div>"#,
                    ),
                    class = if m.outgoing { "message-out" } else { "message-in" },
                    time = escape(&m.time),
                    sender = escape(&m.sender),
                    text = escape(&m.text),
                )
            })
            .collect();

        format!(
            r#"<div id="main"><header><div><span dir="auto" title="{t}">{b}</span></div></header>
<div class="conversation">{rows}</div>
<footer><div contenteditable="true" data-tab="10" role="textbox"></div></footer></div>"#,
            t = escape(title),
            b = escape(title),
        )
    }

    /// Inserts a search-results panel listing `names` into `page`.
    pub fn with_search_results(page: &str, names: &[&str]) -> String {
        let items: String = names
            .iter()
            .map(|name| {
                format!(
                    concat!(
                        r#"<div role="listitem"><div>"#,
                        r#"<span dir="auto" title="{t}">{b}</span></div></div>"#,
                    ),
                    t = escape(name),
                    b = escape(name),
                )
            })
            .collect();
        let panel = format!(r#"<div id="search-results">{items}</div>"#);
        match page.find("</body>") {
            Some(pos) => format!("{}{}{}", &page[..pos], panel, &page[pos..]),
            None => format!("{page}{panel}"),
        }
    }
}
