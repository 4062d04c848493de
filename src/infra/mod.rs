// Adapters for the application ports

pub mod in_memory_catalog;
pub mod upload_sinks;

pub use in_memory_catalog::InMemoryCatalog;
pub use upload_sinks::{DirectorySink, HttpPutSink};
