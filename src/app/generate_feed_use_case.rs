use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

use crate::app::ports::{CatalogPorts, CatalogSource, UploadSink};
use crate::config::AppConfig;
use crate::constants::DEFAULT_FEED_TYPE;
use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::collection::{
    AttributesModifier, CollectionProcessor, MediaGalleryProcessor, ProductCollection, StockProcessor,
    VisibilityModifier,
};
use crate::pipeline::processing::providers::configurable::BuildChildProductInfo;
use crate::pipeline::processing::providers::{
    resolve_stock, AttributesProvider, ConfigurableChildProvider, ConfigurableProductsProvider,
    ConfigurableResolver, DataProvider, JsonConfigProvider, MediaGalleryProvider, PriceProviderResolver,
    PricesProvider, RatingProvider, SimplePriceProvider, StockProvider,
};
use crate::pipeline::storage::{PreSignedUrlStorage, Storage};

/// Outcome of one feed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedReport {
    pub pages: usize,
    pub rows: usize,
    pub file_name: Option<String>,
    pub uploaded_name: Option<String>,
    pub duration: Duration,
}

/// Drives one feed run page by page from the catalog into storage
pub struct FeedGenerator {
    catalog: Arc<dyn CatalogSource>,
    processors: Vec<Box<dyn CollectionProcessor>>,
    providers: Vec<Box<dyn DataProvider>>,
    storage: Box<dyn Storage>,
    page_size: usize,
    delete_file_after: bool,
    feed_type: String,
}

impl FeedGenerator {
    pub fn new(catalog: Arc<dyn CatalogSource>, storage: Box<dyn Storage>, page_size: usize) -> Self {
        Self {
            catalog,
            processors: Vec::new(),
            providers: Vec::new(),
            storage,
            page_size: page_size.max(1),
            delete_file_after: true,
            feed_type: DEFAULT_FEED_TYPE.to_string(),
        }
    }

    /// The standard processor and provider chain over the given ports
    pub fn from_config(config: &AppConfig, ports: CatalogPorts, sink: Arc<dyn UploadSink>) -> Self {
        let stock = resolve_stock(config.capabilities());
        let prices = Arc::new(PriceProviderResolver::new(SimplePriceProvider::default(), stock.clone()));
        let resolver = Arc::new(ConfigurableResolver::new(ports.children.clone()));
        let builder = BuildChildProductInfo::new(prices.clone(), stock.clone())
            .exclude_disabled(config.children.exclude_disabled);
        let storage = PreSignedUrlStorage::from_config(config, sink);

        Self::new(ports.products.clone(), Box::new(storage), config.collection.page_size)
            .delete_file_after(config.delete_file_after_commit())
            .feed_type(&config.storage.feed_type)
            .with_processor(Box::new(AttributesModifier::new(ports.attributes.clone())))
            .with_processor(Box::new(VisibilityModifier))
            .with_processor(Box::new(MediaGalleryProcessor::new(ports.media.clone())))
            .with_processor(Box::new(StockProcessor::new(stock.clone())))
            .with_provider(Box::new(AttributesProvider::new(ports.attributes.clone())))
            .with_provider(Box::new(PricesProvider::new(prices.clone(), resolver.clone())))
            .with_provider(Box::new(StockProvider::new(stock.clone())))
            .with_provider(Box::new(RatingProvider::new(ports.ratings.clone())))
            .with_provider(Box::new(MediaGalleryProvider))
            .with_provider(Box::new(
                ConfigurableProductsProvider::new(resolver.clone(), builder)
                    .dispatch_build_events(config.children.dispatch_build_events),
            ))
            .with_provider(Box::new(ConfigurableChildProvider::new(resolver.clone(), prices)))
            .with_provider(Box::new(JsonConfigProvider::new(resolver, stock)))
    }

    pub fn with_processor(mut self, processor: Box<dyn CollectionProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    pub fn with_provider(mut self, provider: Box<dyn DataProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn delete_file_after(mut self, delete: bool) -> Self {
        self.delete_file_after = delete;
        self
    }

    pub fn feed_type(mut self, feed_type: &str) -> Self {
        self.feed_type = feed_type.to_string();
        self
    }

    /// Runs the feed. Any failure before commit rolls the storage back and
    /// nothing is uploaded.
    #[instrument(skip_all, fields(format = %spec.format, store = %spec.store_code))]
    pub fn generate(&mut self, spec: &FeedSpecification) -> Result<FeedReport> {
        let started = Instant::now();
        self.reset_providers();

        let result = self.run(spec);
        self.reset_providers();

        let duration = started.elapsed();
        metrics::run::duration(duration.as_secs_f64());
        match result {
            Ok((pages, rows)) => {
                let info = self.storage.additional_data();
                let report = FeedReport {
                    pages,
                    rows,
                    file_name: info.map(|i| i.name.clone()),
                    uploaded_name: info.map(|i| i.uploaded_name.clone()),
                    duration,
                };
                info!(pages, rows, file = ?report.file_name, "Feed generated");
                metrics::run::success(&self.feed_type);
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Feed generation failed");
                metrics::run::error(&self.feed_type);
                Err(e)
            }
        }
    }

    fn run(&mut self, spec: &FeedSpecification) -> Result<(usize, usize)> {
        self.storage.initiate(spec)?;

        match self.write_pages(spec) {
            Ok(totals) => {
                self.storage.commit(self.delete_file_after)?;
                Ok(totals)
            }
            Err(e) => {
                if let Err(rollback_error) = self.storage.rollback() {
                    warn!(error = %rollback_error, "Rollback after failed run also failed");
                }
                Err(e)
            }
        }
    }

    fn write_pages(&mut self, spec: &FeedSpecification) -> Result<(usize, usize)> {
        let mut collection = ProductCollection::new(spec.store_code.as_str(), self.page_size);
        let mut pages = 0;
        let mut rows_total = 0;

        loop {
            for processor in self.processors.iter_mut() {
                processor.modify(&mut collection, spec)?;
            }
            let fetched = collection.load_next(self.catalog.as_ref())?;
            if fetched == 0 {
                break;
            }
            for processor in self.processors.iter_mut() {
                processor.process_after_load(&mut collection, spec)?;
            }

            let items = collection.items().to_vec();
            let mut rows: Vec<ProductRow> = items.iter().map(ProductRow::from_product).collect();
            for provider in self.providers.iter_mut() {
                provider.get_data(&mut rows, spec)?;
            }
            let count = rows.len();
            metrics::provider::rows_built(count as u64);
            self.storage.add_data(rows)?;

            for processor in self.processors.iter_mut() {
                processor.process_after_fetch_items(&mut collection, spec)?;
            }
            for provider in self.providers.iter_mut() {
                provider.reset_after_fetch_items();
            }
            drop(items);

            pages += 1;
            rows_total += count;
            debug!(page = collection.page(), fetched, written = count, "Page written");

            if fetched < self.page_size {
                break;
            }
        }
        Ok((pages, rows_total))
    }

    fn reset_providers(&mut self) {
        for provider in self.providers.iter_mut() {
            provider.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{CollectionQuery, UploadRequest};
    use crate::domain::product::Product;
    use crate::error::FeedError;
    use crate::pipeline::storage::StorageState;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct Products(usize);

    impl CatalogSource for Products {
        fn load_page(&self, _query: &CollectionQuery, page: usize, page_size: usize) -> Result<Vec<Product>> {
            let start = (page - 1) * page_size;
            let end = (start + page_size).min(self.0);
            Ok((start..end)
                .map(|i| serde_json::from_value(json!({"id": i as i64 + 1, "sku": format!("SKU-{}", i + 1)})).unwrap())
                .collect())
        }
    }

    #[derive(Default)]
    struct Uploads(Mutex<Vec<String>>);

    impl UploadSink for Uploads {
        fn save(&self, _spec: &FeedSpecification, request: &UploadRequest) -> Result<()> {
            let content = std::fs::read_to_string(&request.file)?;
            self.0.lock().unwrap().push(content);
            Ok(())
        }
    }

    struct FailOnPage(usize, usize);

    impl DataProvider for FailOnPage {
        fn name(&self) -> &'static str {
            "fail"
        }

        fn get_data(&mut self, _rows: &mut [ProductRow], _spec: &FeedSpecification) -> Result<()> {
            self.1 += 1;
            if self.1 == self.0 {
                return Err(FeedError::Catalog("source went away".into()));
            }
            Ok(())
        }
    }

    fn spec() -> FeedSpecification {
        FeedSpecification { format: "json".into(), ..FeedSpecification::default() }
    }

    #[test]
    fn test_pages_until_short_page() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(Uploads::default());
        let storage = PreSignedUrlStorage::new(dir.path(), sink.clone());
        let mut generator = FeedGenerator::new(Arc::new(Products(5)), Box::new(storage), 2);

        let report = generator.generate(&spec()).unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.rows, 5);
        assert!(report.file_name.unwrap().starts_with("product_aws_presigned_"));
        let uploaded: serde_json::Value = serde_json::from_str(&sink.0.lock().unwrap()[0]).unwrap();
        assert_eq!(uploaded.as_array().unwrap().len(), 5);
        assert_eq!(uploaded[4], json!({"entity_id": 5, "sku": "SKU-5", "type_id": "simple"}));
    }

    #[test]
    fn test_exact_multiple_of_page_size_stops_on_empty_page() {
        let dir = TempDir::new().unwrap();
        let storage = PreSignedUrlStorage::new(dir.path(), Arc::new(Uploads::default()));
        let mut generator = FeedGenerator::new(Arc::new(Products(4)), Box::new(storage), 2);

        let report = generator.generate(&spec()).unwrap();
        assert_eq!((report.pages, report.rows), (2, 4));
    }

    #[test]
    fn test_failure_rolls_back_without_upload() {
        let dir = TempDir::new().unwrap();
        let sink = Arc::new(Uploads::default());
        let storage = PreSignedUrlStorage::new(dir.path(), sink.clone());
        let mut generator = FeedGenerator::new(Arc::new(Products(5)), Box::new(storage), 2)
            .with_provider(Box::new(FailOnPage(2, 0)));

        let err = generator.generate(&spec()).unwrap_err();

        assert!(matches!(err, FeedError::Catalog(_)));
        assert_eq!(generator.storage.state(), StorageState::RolledBack);
        assert!(sink.0.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unsupported_format_fails_before_reading() {
        let dir = TempDir::new().unwrap();
        let storage = PreSignedUrlStorage::new(dir.path(), Arc::new(Uploads::default()));
        let mut generator = FeedGenerator::new(Arc::new(Products(1)), Box::new(storage), 2);
        let spec = FeedSpecification { format: "xml".into(), ..FeedSpecification::default() };

        assert!(matches!(generator.generate(&spec), Err(FeedError::UnsupportedFormat(_))));
    }
}
