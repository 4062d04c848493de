// Observability: metrics recorded by the feed pipeline

pub mod metrics;

pub use metrics::MetricName;
