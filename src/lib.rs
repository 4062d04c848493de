pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

// Application use cases and the ports they depend on
pub mod app;
pub mod infra;

// Domain data shapes shared across layers
pub mod domain;

pub mod observability;
pub mod pipeline;

pub use error::{FeedError, Result};
