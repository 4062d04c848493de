// Product collection paging and the processors applied around each load

pub mod processors;

pub use processors::{
    AttributesModifier, CollectionProcessor, MediaGalleryProcessor, StockProcessor, VisibilityModifier,
};

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::app::ports::{CatalogSource, CollectionQuery};
use crate::domain::product::Product;
use crate::error::Result;
use crate::observability::metrics;

/// One page of products plus the query and flags that produced it
#[derive(Debug, Clone)]
pub struct ProductCollection {
    query: CollectionQuery,
    page_size: usize,
    page: usize,
    items: Vec<Arc<Product>>,
    flags: BTreeSet<String>,
    loaded: bool,
}

impl ProductCollection {
    pub fn new(store_code: impl Into<String>, page_size: usize) -> Self {
        Self {
            query: CollectionQuery::new(store_code),
            page_size: page_size.max(1),
            page: 0,
            items: Vec::new(),
            flags: BTreeSet::new(),
            loaded: false,
        }
    }

    pub fn query(&self) -> &CollectionQuery {
        &self.query
    }

    pub fn query_mut(&mut self) -> &mut CollectionQuery {
        &mut self.query
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Current 1-based page, 0 before the first load
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Loads the next page, replacing the current items. Returns the number
    /// of products the source returned, before any after-load filtering.
    pub fn load_next(&mut self, source: &dyn CatalogSource) -> Result<usize> {
        self.clear();
        self.page += 1;
        let products = source.load_page(&self.query, self.page, self.page_size)?;
        let fetched = products.len();
        self.items = products.into_iter().map(Arc::new).collect();
        self.loaded = true;

        debug!(page = self.page, fetched, "Loaded product page");
        metrics::collection::page_loaded();
        Ok(fetched)
    }

    pub fn items(&self) -> &[Arc<Product>] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut Vec<Arc<Product>> {
        &mut self.items
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.contains(flag)
    }

    pub fn set_flag(&mut self, flag: &str) {
        self.flags.insert(flag.to_string());
    }

    pub fn unset_flag(&mut self, flag: &str) {
        self.flags.remove(flag);
    }

    /// Drops the loaded items and their flags; the query and page cursor stay
    pub fn clear(&mut self) {
        self.items.clear();
        self.flags.clear();
        self.loaded = false;
    }

    /// Back to the first page with an empty query
    pub fn reset(&mut self) {
        self.clear();
        self.page = 0;
        self.query = CollectionQuery::new(self.query.store_code.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    struct Pages {
        total: usize,
        seen: Mutex<Vec<(usize, usize)>>,
    }

    impl CatalogSource for Pages {
        fn load_page(&self, _query: &CollectionQuery, page: usize, page_size: usize) -> Result<Vec<Product>> {
            self.seen.lock().unwrap().push((page, page_size));
            let start = (page - 1) * page_size;
            let end = (start + page_size).min(self.total);
            Ok((start..end)
                .map(|i| serde_json::from_value(json!({"id": i as i64 + 1, "sku": format!("S{i}")})).unwrap())
                .collect())
        }
    }

    #[test]
    fn test_pages_advance_and_replace_items() {
        let source = Pages { total: 5, seen: Mutex::new(Vec::new()) };
        let mut collection = ProductCollection::new("default", 3);

        assert_eq!(collection.load_next(&source).unwrap(), 3);
        collection.set_flag("seen");
        assert_eq!(collection.load_next(&source).unwrap(), 2);

        assert_eq!(collection.page(), 2);
        assert_eq!(collection.items()[0].id, 4);
        assert!(!collection.has_flag("seen"));
        assert_eq!(*source.seen.lock().unwrap(), vec![(1, 3), (2, 3)]);
    }

    #[test]
    fn test_reset_restarts_paging_and_query() {
        let source = Pages { total: 1, seen: Mutex::new(Vec::new()) };
        let mut collection = ProductCollection::new("default", 10);
        collection.query_mut().select_attributes(["name"]);
        collection.load_next(&source).unwrap();

        collection.reset();

        assert_eq!(collection.page(), 0);
        assert!(collection.items().is_empty());
        assert_eq!(collection.query(), &CollectionQuery::new("default"));
    }
}
