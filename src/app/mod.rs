pub mod ports;
pub mod generate_feed_use_case;

pub use generate_feed_use_case::{FeedGenerator, FeedReport};
