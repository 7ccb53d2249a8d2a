pub mod chats;
pub mod locator;
pub mod messages;
pub mod snapshot;

pub use chats::ChatListExtractor;
pub use locator::{ElementLocator, ResolvedSelector};
pub use messages::MessageExtractor;
pub use snapshot::PageSnapshot;
