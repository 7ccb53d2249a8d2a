pub mod actions;
pub mod browser;
pub mod chat;
pub mod client;
pub mod core;
pub mod dom;
pub mod errors;
pub mod mcp;
pub mod testing;
pub mod types;
pub mod utils;

pub use actions::{Action, ActionRegistry, ActionResult};
pub use browser::{Page, SessionManager};
pub use client::WhatsAppClient;
pub use crate::core::config::{BrowserConfig, PacingConfig, TimeoutConfig, Viewport};
pub use crate::core::{BrowserTrait, Config, DelayRange, SelectorTable};
pub use errors::{ChatAgentError, Result};
pub use types::*;

#[cfg(feature = "chrome")]
pub use browser::ChromeBrowser;

#[cfg(feature = "chrome")]
pub type DefaultBrowser = ChromeBrowser;

#[cfg(feature = "chrome")]
pub type DefaultClient = WhatsAppClient<DefaultBrowser>;
