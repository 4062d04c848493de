use std::sync::Arc;
use tracing::debug;

use crate::app::ports::{AttributeRepository, MediaGallerySource};
use crate::constants::{is_system_field, MEDIA_GALLERY_ADDED_FLAG};
use crate::domain::product::VISIBLE_IN_SITE;
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::collection::ProductCollection;
use crate::pipeline::processing::providers::StockResolver;

/// Hook points around a page load. Every stage defaults to a no-op, and
/// running a stage twice with the same specification changes nothing.
pub trait CollectionProcessor: Send {
    fn name(&self) -> &'static str;

    /// Before load: adjust the query
    fn modify(&mut self, _collection: &mut ProductCollection, _spec: &FeedSpecification) -> Result<()> {
        Ok(())
    }

    fn process_after_load(&mut self, _collection: &mut ProductCollection, _spec: &FeedSpecification) -> Result<()> {
        Ok(())
    }

    /// After the rows of the page were written
    fn process_after_fetch_items(
        &mut self,
        _collection: &mut ProductCollection,
        _spec: &FeedSpecification,
    ) -> Result<()> {
        Ok(())
    }
}

/// Selects every feed attribute that is not ignored
pub struct AttributesModifier {
    repository: Arc<dyn AttributeRepository>,
}

impl AttributesModifier {
    pub fn new(repository: Arc<dyn AttributeRepository>) -> Self {
        Self { repository }
    }
}

impl CollectionProcessor for AttributesModifier {
    fn name(&self) -> &'static str {
        "attributes"
    }

    fn modify(&mut self, collection: &mut ProductCollection, spec: &FeedSpecification) -> Result<()> {
        let codes: Vec<String> = self
            .repository
            .feed_attributes()?
            .iter()
            .filter(|a| !spec.is_ignored(&a.code) && !is_system_field(&a.code))
            .map(|a| a.code.clone())
            .collect();
        collection.query_mut().select_attributes(codes);
        Ok(())
    }
}

/// Restricts the collection to products visible in the storefront
#[derive(Debug, Default)]
pub struct VisibilityModifier;

impl CollectionProcessor for VisibilityModifier {
    fn name(&self) -> &'static str {
        "visibility"
    }

    fn modify(&mut self, collection: &mut ProductCollection, _spec: &FeedSpecification) -> Result<()> {
        collection.query_mut().visibility = Some(VISIBLE_IN_SITE.to_vec());
        Ok(())
    }
}

/// Attaches gallery entries to the loaded products, once per page
pub struct MediaGalleryProcessor {
    source: Arc<dyn MediaGallerySource>,
}

impl MediaGalleryProcessor {
    pub fn new(source: Arc<dyn MediaGallerySource>) -> Self {
        Self { source }
    }
}

impl CollectionProcessor for MediaGalleryProcessor {
    fn name(&self) -> &'static str {
        "media_gallery"
    }

    fn process_after_load(&mut self, collection: &mut ProductCollection, spec: &FeedSpecification) -> Result<()> {
        if !spec.include_media_gallery || collection.has_flag(MEDIA_GALLERY_ADDED_FLAG) {
            return Ok(());
        }
        let ids: Vec<i64> = collection.items().iter().map(|p| p.id).collect();
        if !ids.is_empty() {
            let mut galleries = self.source.gallery(&ids)?;
            for item in collection.items_mut() {
                let entries = galleries.remove(&item.id).unwrap_or_default();
                Arc::make_mut(item).media_gallery = Some(entries);
            }
        }
        collection.set_flag(MEDIA_GALLERY_ADDED_FLAG);
        Ok(())
    }
}

/// Drops products that cannot be sold unless out-of-stock items are requested
#[derive(Debug)]
pub struct StockProcessor {
    stock: Arc<dyn StockResolver>,
}

impl StockProcessor {
    pub fn new(stock: Arc<dyn StockResolver>) -> Self {
        Self { stock }
    }
}

impl CollectionProcessor for StockProcessor {
    fn name(&self) -> &'static str {
        "stock"
    }

    fn process_after_load(&mut self, collection: &mut ProductCollection, spec: &FeedSpecification) -> Result<()> {
        if spec.include_out_of_stock {
            return Ok(());
        }
        let before = collection.items().len();
        let stock = &self.stock;
        collection
            .items_mut()
            .retain(|product| product.is_configurable() || stock.is_salable(product));
        let dropped = before - collection.items().len();
        if dropped > 0 {
            debug!(dropped, "Filtered out-of-stock products");
            metrics::collection::out_of_stock_filtered(dropped as u64);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::{CatalogSource, CollectionQuery};
    use crate::domain::attribute::Attribute;
    use crate::domain::product::{MediaEntry, Product};
    use crate::pipeline::processing::providers::LegacyStockResolver;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Vec<Product>);

    impl CatalogSource for Fixed {
        fn load_page(&self, _query: &CollectionQuery, page: usize, _size: usize) -> Result<Vec<Product>> {
            Ok(if page == 1 { self.0.clone() } else { Vec::new() })
        }
    }

    fn loaded(products: serde_json::Value) -> ProductCollection {
        let products: Vec<Product> = serde_json::from_value(products).unwrap();
        let mut collection = ProductCollection::new("default", 10);
        collection.load_next(&Fixed(products)).unwrap();
        collection
    }

    struct Attributes;

    impl AttributeRepository for Attributes {
        fn feed_attributes(&self) -> Result<Vec<Arc<Attribute>>> {
            Ok(vec![
                Arc::new(Attribute::new(1, "name")),
                Arc::new(Attribute::new(2, "cost")),
                Arc::new(Attribute::new(3, "color")),
            ])
        }
    }

    #[test]
    fn test_attributes_modifier_skips_ignored_and_is_idempotent() {
        let spec = FeedSpecification {
            ignore_fields: ["cost".to_string()].into_iter().collect(),
            ..FeedSpecification::default()
        };
        let mut collection = ProductCollection::new("default", 10);
        let mut modifier = AttributesModifier::new(Arc::new(Attributes));

        modifier.modify(&mut collection, &spec).unwrap();
        let first = collection.query().clone();
        modifier.modify(&mut collection, &spec).unwrap();

        assert_eq!(collection.query(), &first);
        let selected: Vec<&str> = first.attributes.as_ref().unwrap().iter().map(String::as_str).collect();
        assert_eq!(selected, vec!["color", "name"]);
    }

    #[test]
    fn test_visibility_modifier_restricts_to_site() {
        let mut collection = ProductCollection::new("default", 10);
        VisibilityModifier.modify(&mut collection, &FeedSpecification::default()).unwrap();
        assert_eq!(collection.query().visibility, Some(vec![2, 3, 4]));
    }

    struct Gallery(AtomicUsize);

    impl MediaGallerySource for Gallery {
        fn gallery(&self, product_ids: &[i64]) -> Result<BTreeMap<i64, Vec<MediaEntry>>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(product_ids
                .iter()
                .filter(|id| **id == 1)
                .map(|id| {
                    let entry = serde_json::from_value(json!({"file": "/a.jpg"})).unwrap();
                    (*id, vec![entry])
                })
                .collect())
        }
    }

    #[test]
    fn test_media_gallery_loaded_once_per_page() {
        let spec = FeedSpecification { include_media_gallery: true, ..FeedSpecification::default() };
        let mut collection = loaded(json!([{"id": 1, "sku": "A"}, {"id": 2, "sku": "B"}]));
        let source = Arc::new(Gallery(AtomicUsize::new(0)));
        let mut processor = MediaGalleryProcessor::new(source.clone());

        processor.process_after_load(&mut collection, &spec).unwrap();
        processor.process_after_load(&mut collection, &spec).unwrap();

        assert_eq!(source.0.load(Ordering::SeqCst), 1);
        assert!(collection.has_flag(MEDIA_GALLERY_ADDED_FLAG));
        assert_eq!(collection.items()[0].media_gallery.as_ref().unwrap().len(), 1);
        assert_eq!(collection.items()[1].media_gallery, Some(Vec::new()));
    }

    #[test]
    fn test_media_gallery_skipped_without_flag() {
        let mut collection = loaded(json!([{"id": 1, "sku": "A"}]));
        let source = Arc::new(Gallery(AtomicUsize::new(0)));
        MediaGalleryProcessor::new(source.clone())
            .process_after_load(&mut collection, &FeedSpecification::default())
            .unwrap();
        assert_eq!(source.0.load(Ordering::SeqCst), 0);
        assert!(collection.items()[0].media_gallery.is_none());
    }

    #[test]
    fn test_stock_processor_drops_unsalable_products() {
        let products = json!([
            {"id": 1, "sku": "A", "stock": {"is_in_stock": true, "qty": 3.0}},
            {"id": 2, "sku": "B", "stock": {"is_in_stock": false}},
            {"id": 3, "sku": "C", "type_id": "configurable"}
        ]);
        let mut processor = StockProcessor::new(Arc::new(LegacyStockResolver));

        let mut collection = loaded(products.clone());
        processor.process_after_load(&mut collection, &FeedSpecification::default()).unwrap();
        processor.process_after_load(&mut collection, &FeedSpecification::default()).unwrap();
        let ids: Vec<i64> = collection.items().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let mut collection = loaded(products);
        let spec = FeedSpecification { include_out_of_stock: true, ..FeedSpecification::default() };
        processor.process_after_load(&mut collection, &spec).unwrap();
        assert_eq!(collection.items().len(), 3);
    }
}
