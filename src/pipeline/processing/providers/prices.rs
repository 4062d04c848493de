use chrono::{NaiveDate, Utc};
use std::fmt;
use std::sync::Arc;

use crate::constants::{
    FINAL_PRICE_CODE, MAX_PRICE_FIELD, PRICE_CODE, REGULAR_PRICE_FIELD, SPECIAL_FROM_DATE_CODE,
    SPECIAL_PRICE_CODE, SPECIAL_TO_DATE_CODE,
};
use crate::domain::product::{Product, ProductRow, ProductType};
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::pipeline::processing::providers::configurable::{configurable_models, ConfigurableResolver};
use crate::pipeline::processing::providers::stock::StockResolver;
use crate::pipeline::processing::providers::DataProvider;

/// Prices of one product; absent keys could not be determined
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceMap {
    pub final_price: Option<f64>,
    pub regular_price: Option<f64>,
    pub max_price: Option<f64>,
}

pub trait PriceProvider: fmt::Debug + Send + Sync {
    /// `children` is only consulted by composite product types
    fn get_prices(&self, product: &Product, children: &[Arc<Product>]) -> PriceMap;
}

/// Simple and virtual products: list price, active special price and indexed final price
#[derive(Debug, Clone)]
pub struct SimplePriceProvider {
    as_of: NaiveDate,
}

impl Default for SimplePriceProvider {
    fn default() -> Self {
        Self {
            as_of: Utc::now().date_naive(),
        }
    }
}

impl SimplePriceProvider {
    pub fn as_of(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    fn special_price(&self, product: &Product) -> Option<f64> {
        let special = product.attribute_value(SPECIAL_PRICE_CODE).as_f64()?;
        let from = parse_date(product, SPECIAL_FROM_DATE_CODE);
        let to = parse_date(product, SPECIAL_TO_DATE_CODE);
        let started = from.map_or(true, |from| from <= self.as_of);
        let not_ended = to.map_or(true, |to| self.as_of <= to);
        (started && not_ended).then_some(special)
    }
}

impl PriceProvider for SimplePriceProvider {
    fn get_prices(&self, product: &Product, _children: &[Arc<Product>]) -> PriceMap {
        let regular = product.attribute_value(PRICE_CODE).as_f64();
        let indexed = product.attribute_value(FINAL_PRICE_CODE).as_f64();
        let final_price = [regular, self.special_price(product), indexed]
            .into_iter()
            .flatten()
            .reduce(f64::min);

        PriceMap {
            final_price,
            regular_price: regular,
            max_price: final_price,
        }
    }
}

/// Configurable products are priced from their salable children
#[derive(Debug)]
pub struct ConfigurablePriceProvider {
    simple: SimplePriceProvider,
    stock: Arc<dyn StockResolver>,
}

impl ConfigurablePriceProvider {
    pub fn new(simple: SimplePriceProvider, stock: Arc<dyn StockResolver>) -> Self {
        Self { simple, stock }
    }
}

impl PriceProvider for ConfigurablePriceProvider {
    fn get_prices(&self, _product: &Product, children: &[Arc<Product>]) -> PriceMap {
        let child_prices: Vec<PriceMap> = children
            .iter()
            .filter(|child| self.stock.is_salable(child))
            .map(|child| self.simple.get_prices(child, &[]))
            .collect();

        let regular_price = child_prices.iter().filter_map(|p| p.regular_price).reduce(f64::min);
        let final_price = child_prices.iter().filter_map(|p| p.final_price).reduce(f64::min);
        let max_price = child_prices.iter().filter_map(|p| p.final_price).reduce(f64::max);

        PriceMap {
            final_price,
            regular_price,
            max_price,
        }
    }
}

/// Picks the price provider for a product type
#[derive(Debug, Clone)]
pub struct PriceProviderResolver {
    simple: Arc<dyn PriceProvider>,
    configurable: Arc<dyn PriceProvider>,
}

impl PriceProviderResolver {
    pub fn new(simple: SimplePriceProvider, stock: Arc<dyn StockResolver>) -> Self {
        Self {
            configurable: Arc::new(ConfigurablePriceProvider::new(simple.clone(), stock)),
            simple: Arc::new(simple),
        }
    }

    /// Bundle and grouped products have no price provider
    pub fn resolve(&self, product: &Product) -> Option<Arc<dyn PriceProvider>> {
        match product.type_id {
            ProductType::Configurable => Some(self.configurable.clone()),
            ProductType::Bundle | ProductType::Grouped => None,
            _ => Some(self.simple.clone()),
        }
    }
}

/// Writes `final_price`, `regular_price` and `max_price`
#[derive(Debug)]
pub struct PricesProvider {
    prices: Arc<PriceProviderResolver>,
    configurable: Arc<ConfigurableResolver>,
}

impl PricesProvider {
    pub fn new(prices: Arc<PriceProviderResolver>, configurable: Arc<ConfigurableResolver>) -> Self {
        Self { prices, configurable }
    }
}

impl DataProvider for PricesProvider {
    fn name(&self) -> &'static str {
        "prices"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        let fields = [FINAL_PRICE_CODE, REGULAR_PRICE_FIELD, MAX_PRICE_FIELD];
        if fields.iter().all(|field| spec.is_ignored(field)) {
            return Ok(());
        }

        self.configurable.load(&configurable_models(rows))?;

        for row in rows.iter_mut() {
            let Some(product) = row.model() else {
                continue;
            };
            let Some(provider) = self.prices.resolve(&product) else {
                continue;
            };
            let children = if product.is_configurable() {
                self.configurable.children(&product)
            } else {
                Vec::new()
            };
            let prices = provider.get_prices(&product, &children);

            for (field, price) in fields
                .iter()
                .zip([prices.final_price, prices.regular_price, prices.max_price])
            {
                if let Some(price) = price.filter(|_| !spec.is_ignored(field)) {
                    row.set(*field, price);
                }
            }
        }
        Ok(())
    }
}

fn parse_date(product: &Product, code: &str) -> Option<NaiveDate> {
    let raw = product.attribute_value(code);
    let raw = raw.as_str()?.trim();
    let date = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
