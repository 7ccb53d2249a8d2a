pub mod base;
pub mod registry;
pub mod tools;

pub use base::{Action, ActionError, ActionResult};
pub use registry::{ActionMetadata, ActionRegistry};
pub use tools::{ConnectWhatsApp, ListChats, ReadMessages, SendMessage};
