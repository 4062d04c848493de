//! Configurable products: variant discovery and the providers built on it.

pub mod child;
pub mod child_info;
pub mod json_config;
pub mod products;
pub mod resolver;

use std::sync::Arc;

use crate::domain::product::{Product, ProductRow};

pub use child::ConfigurableChildProvider;
pub use child_info::{AttributeRow, BuildChildProductInfo, ChildInfo, ChildRowHook};
pub use json_config::JsonConfigProvider;
pub use products::{BuildContext, BuildHook, ConfigurableProductsProvider};
pub use resolver::ConfigurableResolver;

/// Product models of the configurable rows on a page, in row order
pub fn configurable_models(rows: &[ProductRow]) -> Vec<Arc<Product>> {
    rows.iter()
        .filter_map(ProductRow::model)
        .filter(|product| product.is_configurable())
        .collect()
}
