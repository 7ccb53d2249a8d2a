pub mod resolver;

pub use resolver::{exact_result_hits, ChatResolver, ResultHit};
