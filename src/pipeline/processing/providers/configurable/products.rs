use std::sync::Arc;
use tracing::debug;

use crate::domain::attribute::Attribute;
use crate::domain::product::{Product, ProductRow};
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::pipeline::processing::providers::configurable::{
    configurable_models, BuildChildProductInfo, ConfigurableResolver,
};
use crate::pipeline::processing::providers::DataProvider;

/// Mutable view of one parent while its children are being merged
pub struct BuildContext<'a> {
    pub row: &'a mut ProductRow,
    pub product: &'a Product,
    pub children: Vec<Arc<Product>>,
    pub attributes: Vec<Arc<Attribute>>,
}

/// Observers around child info assembly, run in registration order
pub trait BuildHook: Send + Sync {
    fn before_build(&self, _context: &mut BuildContext<'_>, _spec: &FeedSpecification) {}

    fn after_build(&self, _context: &mut BuildContext<'_>, _spec: &FeedSpecification) {}
}

/// Merges variant rows into `child_info` of configurable products
pub struct ConfigurableProductsProvider {
    resolver: Arc<ConfigurableResolver>,
    builder: BuildChildProductInfo,
    hooks: Vec<Box<dyn BuildHook>>,
    dispatch_build_events: bool,
}

impl ConfigurableProductsProvider {
    pub fn new(resolver: Arc<ConfigurableResolver>, builder: BuildChildProductInfo) -> Self {
        Self {
            resolver,
            builder,
            hooks: Vec::new(),
            dispatch_build_events: true,
        }
    }

    pub fn dispatch_build_events(mut self, enabled: bool) -> Self {
        self.dispatch_build_events = enabled;
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn BuildHook>) -> Self {
        self.hooks.push(hook);
        self
    }
}

impl DataProvider for ConfigurableProductsProvider {
    fn name(&self) -> &'static str {
        "configurable_products"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        let parents = configurable_models(rows);
        if parents.is_empty() {
            return Ok(());
        }

        self.resolver.load(&parents)?;
        if parents.iter().all(|parent| self.resolver.attributes(parent).is_empty()) {
            debug!(parents = parents.len(), "No configurable attributes on page");
            return Ok(());
        }

        for row in rows.iter_mut() {
            let Some(product) = row.model().filter(|p| p.is_configurable()) else {
                continue;
            };
            let children = self.resolver.children(&product);
            let attributes = self.resolver.attributes(&product);
            if children.is_empty() || attributes.is_empty() {
                continue;
            }

            let mut context = BuildContext {
                row,
                product: &product,
                children,
                attributes,
            };

            if self.dispatch_build_events {
                for hook in &self.hooks {
                    hook.before_build(&mut context, spec);
                }
            }

            self.builder
                .execute(context.row, &context.children, &context.attributes, spec)?;

            if self.dispatch_build_events {
                for hook in &self.hooks {
                    hook.after_build(&mut context, spec);
                }
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.resolver.reset();
        self.builder.reset();
    }

    fn reset_after_fetch_items(&mut self) {
        self.resolver.reset();
        self.builder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::ChildCatalog;
    use crate::constants::CHILD_INFO_FIELD;
    use crate::domain::attribute::{AttributeOption, AttributeSource, OptionTable};
    use crate::domain::value::Value;
    use crate::pipeline::processing::providers::prices::{PriceProviderResolver, SimplePriceProvider};
    use crate::pipeline::processing::providers::stock::{LegacyStockResolver, StockResolver};
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Catalog {
        queries: AtomicUsize,
    }

    impl ChildCatalog for Catalog {
        fn children(&self, parent_link_ids: &[i64], _codes: &BTreeSet<String>) -> Result<BTreeMap<i64, Vec<Product>>> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(parent_link_ids
                .iter()
                .filter(|id| **id == 10)
                .map(|id| {
                    let children = vec![
                        serde_json::from_value(json!({"id": 11, "sku": "P-B", "stock": {"is_in_stock": true}, "data": {"color": "49"}})).unwrap(),
                        serde_json::from_value(json!({"id": 12, "sku": "P-W", "stock": {"is_in_stock": true}, "data": {"color": "50"}})).unwrap(),
                    ];
                    (*id, children)
                })
                .collect())
        }

        fn configurable_attributes(&self, parent_link_ids: &[i64]) -> Result<BTreeMap<i64, Vec<Arc<Attribute>>>> {
            let table = OptionTable::new(vec![
                AttributeOption { value: "49".into(), label: "Black".into() },
                AttributeOption { value: "50".into(), label: "White".into() },
            ]);
            let color = Arc::new(
                Attribute::new(93, "color")
                    .with_labels(Some("Color"), None)
                    .with_source(AttributeSource::Static(Arc::new(table))),
            );
            Ok(parent_link_ids
                .iter()
                .filter(|id| **id == 10)
                .map(|id| (*id, vec![color.clone()]))
                .collect())
        }
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl BuildHook for Recorder {
        fn before_build(&self, context: &mut BuildContext<'_>, _spec: &FeedSpecification) {
            self.0.lock().unwrap().push(format!("before:{}", context.children.len()));
        }

        fn after_build(&self, context: &mut BuildContext<'_>, _spec: &FeedSpecification) {
            let built = context
                .row
                .get(CHILD_INFO_FIELD)
                .and_then(Value::entries)
                .map_or(0, <[_]>::len);
            self.0.lock().unwrap().push(format!("after:{built}"));
        }
    }

    fn provider(catalog: Arc<Catalog>) -> ConfigurableProductsProvider {
        let stock: Arc<dyn StockResolver> = Arc::new(LegacyStockResolver);
        let prices = Arc::new(PriceProviderResolver::new(SimplePriceProvider::default(), stock.clone()));
        let resolver = Arc::new(ConfigurableResolver::new(catalog));
        ConfigurableProductsProvider::new(resolver, BuildChildProductInfo::new(prices, stock))
    }

    fn page() -> Vec<Arc<Product>> {
        vec![
            Arc::new(serde_json::from_value(json!({"id": 10, "sku": "P", "type_id": "configurable"})).unwrap()),
            Arc::new(serde_json::from_value(json!({"id": 20, "sku": "S"})).unwrap()),
            Arc::new(serde_json::from_value(json!({"id": 30, "sku": "Q", "type_id": "configurable"})).unwrap()),
        ]
    }

    #[test]
    fn test_child_info_merged_into_configurable_rows() {
        let products = page();
        let mut rows: Vec<ProductRow> = products.iter().map(ProductRow::from_product).collect();

        provider(Arc::new(Catalog::default()))
            .get_data(&mut rows, &FeedSpecification::default())
            .unwrap();

        assert_eq!(
            rows[0].get(CHILD_INFO_FIELD).unwrap().to_json(),
            json!([
                {"variant_id": 11, "variant_sku": "P-B", "attributes": [{"code": "color", "label": "Color", "value": "Black"}]},
                {"variant_id": 12, "variant_sku": "P-W", "attributes": [{"code": "color", "label": "Color", "value": "White"}]}
            ])
        );
        assert!(rows[1].get(CHILD_INFO_FIELD).is_none());
        // Parent without children or attributes is left alone
        assert!(rows[2].get(CHILD_INFO_FIELD).is_none());
    }

    #[test]
    fn test_hooks_wrap_the_build_in_order() {
        let products = page();
        let mut rows: Vec<ProductRow> = products.iter().map(ProductRow::from_product).collect();
        let events = Arc::new(Mutex::new(Vec::new()));

        provider(Arc::new(Catalog::default()))
            .with_hook(Box::new(Recorder(events.clone())))
            .get_data(&mut rows, &FeedSpecification::default())
            .unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["before:2".to_string(), "after:2".to_string()]);
    }

    #[test]
    fn test_hooks_skipped_when_events_disabled() {
        let products = page();
        let mut rows: Vec<ProductRow> = products.iter().map(ProductRow::from_product).collect();
        let events = Arc::new(Mutex::new(Vec::new()));

        provider(Arc::new(Catalog::default()))
            .dispatch_build_events(false)
            .with_hook(Box::new(Recorder(events.clone())))
            .get_data(&mut rows, &FeedSpecification::default())
            .unwrap();

        assert!(events.lock().unwrap().is_empty());
        assert!(rows[0].get(CHILD_INFO_FIELD).is_some());
    }

    #[test]
    fn test_page_reset_reloads_children() {
        let catalog = Arc::new(Catalog::default());
        let mut provider = provider(catalog.clone());
        let products = page();

        let mut rows: Vec<ProductRow> = products.iter().map(ProductRow::from_product).collect();
        provider.get_data(&mut rows, &FeedSpecification::default()).unwrap();
        provider.reset_after_fetch_items();
        let mut rows: Vec<ProductRow> = products.iter().map(ProductRow::from_product).collect();
        provider.get_data(&mut rows, &FeedSpecification::default()).unwrap();

        assert_eq!(catalog.queries.load(Ordering::SeqCst), 2);
    }
}
