#[cfg(feature = "chrome")]
pub mod chrome;
pub mod session;

#[cfg(feature = "chrome")]
pub use chrome::ChromeBrowser;
pub use session::{Page, SessionManager};
