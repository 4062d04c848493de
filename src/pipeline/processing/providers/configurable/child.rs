use std::sync::Arc;

use crate::constants::{CHILD_FINAL_PRICE_FIELD, CHILD_NAME_FIELD, CHILD_SKU_FIELD};
use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::pipeline::processing::providers::configurable::{configurable_models, ConfigurableResolver};
use crate::pipeline::processing::providers::prices::PriceProviderResolver;
use crate::pipeline::processing::providers::DataProvider;

/// Flat lists of variant skus, names and final prices on configurable rows
#[derive(Debug)]
pub struct ConfigurableChildProvider {
    resolver: Arc<ConfigurableResolver>,
    prices: Arc<PriceProviderResolver>,
}

impl ConfigurableChildProvider {
    pub fn new(resolver: Arc<ConfigurableResolver>, prices: Arc<PriceProviderResolver>) -> Self {
        Self { resolver, prices }
    }
}

impl DataProvider for ConfigurableChildProvider {
    fn name(&self) -> &'static str {
        "configurable_child"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        let with_sku = !spec.is_ignored(CHILD_SKU_FIELD);
        let with_name = !spec.is_ignored(CHILD_NAME_FIELD);
        let with_price = spec.include_child_prices && !spec.is_ignored(CHILD_FINAL_PRICE_FIELD);
        if !with_sku && !with_name && !with_price {
            return Ok(());
        }

        let parents = configurable_models(rows);
        if parents.is_empty() {
            return Ok(());
        }
        self.resolver.load(&parents)?;

        for row in rows.iter_mut() {
            let Some(product) = row.model().filter(|p| p.is_configurable()) else {
                continue;
            };
            for child in self.resolver.children(&product) {
                if with_sku && !child.sku.is_empty() {
                    row.push_to_list(CHILD_SKU_FIELD, child.sku.as_str());
                }
                if with_name {
                    if let Some(name) = child.name().filter(|n| !n.is_empty()) {
                        row.push_to_list(CHILD_NAME_FIELD, name);
                    }
                }
                if with_price {
                    let price = self
                        .prices
                        .resolve(&child)
                        .and_then(|provider| provider.get_prices(&child, &[]).final_price);
                    if let Some(price) = price {
                        row.push_to_list(CHILD_FINAL_PRICE_FIELD, price);
                    }
                }
            }
        }
        Ok(())
    }
}
