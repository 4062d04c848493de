//! Data providers enrich feed rows in place, one page at a time.

pub mod attributes;
pub mod configurable;
pub mod media_gallery;
pub mod prices;
pub mod rating;
pub mod stock;

use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::error::Result;

pub use attributes::AttributesProvider;
pub use configurable::{
    ConfigurableChildProvider, ConfigurableProductsProvider, ConfigurableResolver, JsonConfigProvider,
};
pub use media_gallery::MediaGalleryProvider;
pub use prices::{PriceProviderResolver, PricesProvider, SimplePriceProvider};
pub use rating::RatingProvider;
pub use stock::{resolve_stock, LegacyStockResolver, MsiStockResolver, StockProvider, StockResolver};

/// A stage that adds or replaces fields on every row of a page.
///
/// Providers never reorder rows and never drop them. Per-page state is
/// cleared in `reset_after_fetch_items`, per-run state in `reset`.
pub trait DataProvider {
    fn name(&self) -> &'static str;

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()>;

    fn reset(&mut self) {}

    fn reset_after_fetch_items(&mut self) {}
}
