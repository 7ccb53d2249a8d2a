pub mod browser;
pub mod config;
pub mod selectors;

pub use browser::{BrowserTrait, KeyModifier};
pub use config::{Config, DelayRange};
pub use selectors::{SelectorCandidates, SelectorTable};
