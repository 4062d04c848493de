use std::sync::Arc;

use crate::config::Capabilities;
use crate::constants::{IN_STOCK_FIELD, STOCK_QTY_FIELD};
use crate::domain::product::{Product, ProductRow};
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::pipeline::processing::providers::DataProvider;

/// Salability and quantity of a product
pub trait StockResolver: std::fmt::Debug + Send + Sync {
    fn is_salable(&self, product: &Product) -> bool;

    fn qty(&self, product: &Product) -> f64;
}

/// Single stock item: the stored flag and quantity
#[derive(Debug, Default)]
pub struct LegacyStockResolver;

impl StockResolver for LegacyStockResolver {
    fn is_salable(&self, product: &Product) -> bool {
        product.is_enabled() && product.stock.is_in_stock
    }

    fn qty(&self, product: &Product) -> f64 {
        product.stock.qty
    }
}

/// Multi-source inventory: enabled sources minus open reservations
#[derive(Debug, Default)]
pub struct MsiStockResolver;

impl StockResolver for MsiStockResolver {
    fn is_salable(&self, product: &Product) -> bool {
        let any_source_in_stock = product
            .stock
            .source_items
            .iter()
            .any(|item| item.enabled && item.in_stock);
        product.is_enabled() && any_source_in_stock && self.qty(product) > 0.0
    }

    fn qty(&self, product: &Product) -> f64 {
        let on_hand: f64 = product
            .stock
            .source_items
            .iter()
            .filter(|item| item.enabled)
            .map(|item| item.quantity)
            .sum();
        on_hand + product.stock.reservations
    }
}

pub fn resolve_stock(capabilities: Capabilities) -> Arc<dyn StockResolver> {
    if capabilities.msi {
        Arc::new(MsiStockResolver)
    } else {
        Arc::new(LegacyStockResolver)
    }
}

/// Writes `in_stock` and `stock_qty`
#[derive(Debug)]
pub struct StockProvider {
    resolver: Arc<dyn StockResolver>,
}

impl StockProvider {
    pub fn new(resolver: Arc<dyn StockResolver>) -> Self {
        Self { resolver }
    }
}

impl DataProvider for StockProvider {
    fn name(&self) -> &'static str {
        "stock"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        let with_flag = !spec.is_ignored(IN_STOCK_FIELD);
        let with_qty = !spec.is_ignored(STOCK_QTY_FIELD);
        if !with_flag && !with_qty {
            return Ok(());
        }

        for row in rows.iter_mut() {
            let Some(product) = row.model() else {
                continue;
            };
            if with_flag {
                row.set(IN_STOCK_FIELD, self.resolver.is_salable(&product));
            }
            if with_qty {
                row.set(STOCK_QTY_FIELD, self.resolver.qty(&product));
            }
        }
        Ok(())
    }
}
