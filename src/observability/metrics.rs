//! Metrics for the feed generation pipeline
//!
//! Recording goes through the `metrics` facade. No exporter is installed by
//! the crate; the host process decides whether a recorder is present.

use std::fmt;

/// Enum representing all metric names used in the feed pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Run metrics
    RunsSuccess,
    RunsError,
    RunDuration,

    // Collection metrics
    PagesLoaded,
    ItemsFilteredOutOfStock,

    // Provider metrics
    RowsBuilt,
    ChildrenBuilt,
    ChildrenSkipped,
    DuplicateParents,

    // Normalize metrics
    ValuesDropped,
    NormalizeWarnings,

    // Storage metrics
    RowsWritten,
    FileBytes,
    Compressions,
    UploadsSuccess,
    UploadsError,
    Rollbacks,
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RunsSuccess => "catalog_feed_runs_success_total",
            MetricName::RunsError => "catalog_feed_runs_error_total",
            MetricName::RunDuration => "catalog_feed_run_duration_seconds",

            MetricName::PagesLoaded => "catalog_feed_collection_pages_loaded_total",
            MetricName::ItemsFilteredOutOfStock => "catalog_feed_collection_items_out_of_stock_total",

            MetricName::RowsBuilt => "catalog_feed_provider_rows_built_total",
            MetricName::ChildrenBuilt => "catalog_feed_provider_children_built_total",
            MetricName::ChildrenSkipped => "catalog_feed_provider_children_skipped_total",
            MetricName::DuplicateParents => "catalog_feed_provider_duplicate_parents_total",

            MetricName::ValuesDropped => "catalog_feed_normalize_values_dropped_total",
            MetricName::NormalizeWarnings => "catalog_feed_normalize_warnings_total",

            MetricName::RowsWritten => "catalog_feed_storage_rows_written_total",
            MetricName::FileBytes => "catalog_feed_storage_file_bytes",
            MetricName::Compressions => "catalog_feed_storage_compressions_total",
            MetricName::UploadsSuccess => "catalog_feed_storage_uploads_success_total",
            MetricName::UploadsError => "catalog_feed_storage_uploads_error_total",
            MetricName::Rollbacks => "catalog_feed_storage_rollbacks_total",
        }
    }

    /// Returns (phase, description, unit)
    pub fn metadata(&self) -> (&'static str, &'static str, Option<&'static str>) {
        match self {
            MetricName::RunsSuccess => ("run", "Feed runs committed", None),
            MetricName::RunsError => ("run", "Feed runs rolled back", None),
            MetricName::RunDuration => ("run", "Feed run duration", Some("s")),

            MetricName::PagesLoaded => ("collection", "Collection pages loaded", None),
            MetricName::ItemsFilteredOutOfStock => ("collection", "Items removed as not salable", None),

            MetricName::RowsBuilt => ("provider", "Rows handed to data providers", None),
            MetricName::ChildrenBuilt => ("provider", "Child rows built for configurable products", None),
            MetricName::ChildrenSkipped => ("provider", "Children skipped by status, stock or duplication", None),
            MetricName::DuplicateParents => ("provider", "Duplicate parent ids collapsed", None),

            MetricName::ValuesDropped => ("normalize", "Attribute values normalized to null", None),
            MetricName::NormalizeWarnings => ("normalize", "Values that failed normalization", None),

            MetricName::RowsWritten => ("storage", "Rows appended to the feed file", None),
            MetricName::FileBytes => ("storage", "Committed feed file size", Some("bytes")),
            MetricName::Compressions => ("storage", "Feed files gzip compressed", None),
            MetricName::UploadsSuccess => ("storage", "Successful uploads", None),
            MetricName::UploadsError => ("storage", "Failed uploads", None),
            MetricName::Rollbacks => ("storage", "Pending files discarded", None),
        }
    }

    pub fn all_metrics() -> impl Iterator<Item = MetricName> {
        use MetricName::*;
        [
            RunsSuccess,
            RunsError,
            RunDuration,
            PagesLoaded,
            ItemsFilteredOutOfStock,
            RowsBuilt,
            ChildrenBuilt,
            ChildrenSkipped,
            DuplicateParents,
            ValuesDropped,
            NormalizeWarnings,
            RowsWritten,
            FileBytes,
            Compressions,
            UploadsSuccess,
            UploadsError,
            Rollbacks,
        ]
        .into_iter()
    }
}

// ============================================================================
// Run Metrics
// ============================================================================

pub mod run {
    use super::MetricName;

    pub fn success(feed_type: &str) {
        ::metrics::counter!(MetricName::RunsSuccess.as_str(), "feed_type" => feed_type.to_string())
            .increment(1);
    }

    pub fn error(feed_type: &str) {
        ::metrics::counter!(MetricName::RunsError.as_str(), "feed_type" => feed_type.to_string())
            .increment(1);
    }

    pub fn duration(secs: f64) {
        ::metrics::histogram!(MetricName::RunDuration.as_str()).record(secs);
    }
}

// ============================================================================
// Collection Metrics
// ============================================================================

pub mod collection {
    use super::MetricName;

    pub fn page_loaded() {
        ::metrics::counter!(MetricName::PagesLoaded.as_str()).increment(1);
    }

    pub fn out_of_stock_filtered(count: u64) {
        ::metrics::counter!(MetricName::ItemsFilteredOutOfStock.as_str()).increment(count);
    }
}

// ============================================================================
// Provider Metrics
// ============================================================================

pub mod provider {
    use super::MetricName;

    pub fn rows_built(count: u64) {
        ::metrics::counter!(MetricName::RowsBuilt.as_str()).increment(count);
    }

    pub fn children_built(count: u64) {
        ::metrics::counter!(MetricName::ChildrenBuilt.as_str()).increment(count);
    }

    /// Record a skipped child with the reason (disabled, out_of_stock, duplicate)
    pub fn child_skipped(reason: &'static str) {
        ::metrics::counter!(MetricName::ChildrenSkipped.as_str(), "reason" => reason).increment(1);
    }

    pub fn duplicate_parents(count: u64) {
        ::metrics::counter!(MetricName::DuplicateParents.as_str()).increment(count);
    }
}

// ============================================================================
// Normalize Metrics
// ============================================================================

pub mod normalize {
    use super::MetricName;

    pub fn value_dropped() {
        ::metrics::counter!(MetricName::ValuesDropped.as_str()).increment(1);
    }

    pub fn warning() {
        ::metrics::counter!(MetricName::NormalizeWarnings.as_str()).increment(1);
    }
}

// ============================================================================
// Storage Metrics
// ============================================================================

pub mod storage {
    use super::MetricName;

    pub fn rows_written(count: u64) {
        ::metrics::counter!(MetricName::RowsWritten.as_str()).increment(count);
    }

    pub fn file_bytes(bytes: u64) {
        ::metrics::histogram!(MetricName::FileBytes.as_str()).record(bytes as f64);
    }

    pub fn compressed() {
        ::metrics::counter!(MetricName::Compressions.as_str()).increment(1);
    }

    pub fn upload_success() {
        ::metrics::counter!(MetricName::UploadsSuccess.as_str()).increment(1);
    }

    pub fn upload_error() {
        ::metrics::counter!(MetricName::UploadsError.as_str()).increment(1);
    }

    pub fn rollback() {
        ::metrics::counter!(MetricName::Rollbacks.as_str()).increment(1);
    }
}
