pub mod pacing;

pub use pacing::pause;
