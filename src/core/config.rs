use crate::core::selectors::SelectorTable;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const WHATSAPP_WEB_URL: &str = "https://web.whatsapp.com/";
pub const DEFAULT_SESSION_DIR: &str = "./whatsapp_session";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub browser: BrowserConfig,
    pub timeouts: TimeoutConfig,
    pub pacing: PacingConfig,
    pub selectors: SelectorTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    pub headless: bool,
    pub session_dir: PathBuf,
    pub app_url: String,
    pub user_agent: Option<String>,
    pub viewport: Viewport,
    pub args: Vec<String>,
    pub idle_timeout_secs: u64,
    pub navigation_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Per-wait bounds. There is no operation-level deadline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub element_ms: u64,
    pub sidebar_ms: u64,
    pub verify_ms: u64,
}

/// Inclusive uniform range used for human-paced pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    pub fn sample(&self) -> u64 {
        if self.max_ms <= self.min_ms {
            return self.min_ms;
        }
        let mut rng = rand::rng();
        rng.random_range(self.min_ms..=self.max_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    pub after_navigation: DelayRange,
    pub after_dialog: DelayRange,
    pub after_sidebar_list: DelayRange,
    pub after_sidebar_chat: DelayRange,
    pub before_search_click: DelayRange,
    pub after_search_click: DelayRange,
    pub after_select_all: DelayRange,
    pub after_clear: DelayRange,
    pub search_keystroke: DelayRange,
    /// Typing the chat name before sending is slower than before reading.
    pub send_search_keystroke: DelayRange,
    pub awaiting_results: DelayRange,
    pub after_open_for_read: DelayRange,
    pub after_open_for_send: DelayRange,
    pub after_compose_click: DelayRange,
    pub compose_keystroke: DelayRange,
    pub before_send: DelayRange,
}

impl Config {
    /// Same selectors and timeouts, no pauses. Meant for tests and dry runs.
    pub fn instant() -> Self {
        Self {
            pacing: PacingConfig::instant(),
            ..Default::default()
        }
    }

    pub fn with_session_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.browser.session_dir = dir.into();
        self
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            session_dir: PathBuf::from(DEFAULT_SESSION_DIR),
            app_url: WHATSAPP_WEB_URL.to_string(),
            user_agent: Some(DEFAULT_USER_AGENT.to_string()),
            viewport: Viewport::default(),
            args: vec![],
            idle_timeout_secs: 60 * 60 * 24,
            navigation_timeout_ms: 30000,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 900,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            element_ms: 3000,
            sidebar_ms: 15000,
            verify_ms: 3000,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            after_navigation: DelayRange::new(2000, 4000),
            after_dialog: DelayRange::new(1500, 2500),
            after_sidebar_list: DelayRange::new(1000, 3000),
            after_sidebar_chat: DelayRange::new(500, 1200),
            before_search_click: DelayRange::new(400, 900),
            after_search_click: DelayRange::new(300, 700),
            after_select_all: DelayRange::new(200, 400),
            after_clear: DelayRange::new(300, 800),
            search_keystroke: DelayRange::new(50, 150),
            send_search_keystroke: DelayRange::new(100, 300),
            awaiting_results: DelayRange::new(1500, 3500),
            after_open_for_read: DelayRange::new(1500, 3000),
            after_open_for_send: DelayRange::new(1000, 2500),
            after_compose_click: DelayRange::new(600, 1500),
            compose_keystroke: DelayRange::new(50, 200),
            before_send: DelayRange::new(400, 1000),
        }
    }
}

impl PacingConfig {
    pub fn instant() -> Self {
        let zero = DelayRange::zero();
        Self {
            after_navigation: zero,
            after_dialog: zero,
            after_sidebar_list: zero,
            after_sidebar_chat: zero,
            before_search_click: zero,
            after_search_click: zero,
            after_select_all: zero,
            after_clear: zero,
            search_keystroke: zero,
            send_search_keystroke: zero,
            awaiting_results: zero,
            after_open_for_read: zero,
            after_open_for_send: zero,
            after_compose_click: zero,
            compose_keystroke: zero,
            before_send: zero,
        }
    }
}
