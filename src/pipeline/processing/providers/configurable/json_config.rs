use serde_json::{json, Map, Value as Json};
use std::sync::Arc;

use crate::constants::{JSON_CONFIG_FIELD, SWATCH_JSON_CONFIG_FIELD};
use crate::domain::attribute::{Attribute, AttributeOption};
use crate::domain::product::{Product, ProductRow};
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::pipeline::processing::providers::configurable::{configurable_models, ConfigurableResolver};
use crate::pipeline::processing::providers::stock::StockResolver;
use crate::pipeline::processing::providers::DataProvider;

/// Storefront option configuration of configurable products, as JSON strings.
///
/// `json_config` lists every configurable attribute with the options used by
/// the allowed children and the child ids carrying each option, plus an index
/// of child id to selected option per attribute. `swatch_json_config` maps
/// attribute id and option id to the swatch type and value.
#[derive(Debug)]
pub struct JsonConfigProvider {
    resolver: Arc<ConfigurableResolver>,
    stock: Arc<dyn StockResolver>,
}

impl JsonConfigProvider {
    pub fn new(resolver: Arc<ConfigurableResolver>, stock: Arc<dyn StockResolver>) -> Self {
        Self { resolver, stock }
    }

    fn allowed_children(&self, children: Vec<Arc<Product>>, spec: &FeedSpecification) -> Vec<Arc<Product>> {
        children
            .into_iter()
            .filter(|child| child.is_enabled())
            .filter(|child| spec.include_out_of_stock || self.stock.is_salable(child))
            .collect()
    }
}

impl DataProvider for JsonConfigProvider {
    fn name(&self) -> &'static str {
        "json_config"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        if !spec.include_json_config {
            return Ok(());
        }
        let with_config = !spec.is_ignored(JSON_CONFIG_FIELD);
        let with_swatches = !spec.is_ignored(SWATCH_JSON_CONFIG_FIELD);
        if !with_config && !with_swatches {
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
            let children = self.allowed_children(self.resolver.children(&product), spec);
            let attributes = self.resolver.attributes(&product);

            if with_config {
                let config = json_config(&product, &children, &attributes);
                row.set(JSON_CONFIG_FIELD, config.to_string());
            }
            if with_swatches {
                let swatches = swatch_config(&children, &attributes);
                row.set(SWATCH_JSON_CONFIG_FIELD, swatches.to_string());
            }
        }
        Ok(())
    }
}

/// Options of `attribute` used by `children`, in option table order
fn used_options(attribute: &Attribute, children: &[Arc<Product>]) -> Vec<(AttributeOption, Vec<String>)> {
    let child_values: Vec<(String, String)> = children
        .iter()
        .filter_map(|child| {
            let value = child.attribute_value(&attribute.code);
            (!value.is_null()).then(|| (child.id.to_string(), value.to_display_string()))
        })
        .collect();

    let mut table = attribute.options();
    if table.is_empty() {
        // Without an option table the stored values are their own labels
        for (_, value) in &child_values {
            if !table.iter().any(|option| &option.value == value) {
                table.push(AttributeOption {
                    value: value.clone(),
                    label: value.clone(),
                });
            }
        }
    }

    table
        .into_iter()
        .filter_map(|option| {
            let products: Vec<String> = child_values
                .iter()
                .filter(|(_, value)| *value == option.value)
                .map(|(id, _)| id.clone())
                .collect();
            (!products.is_empty()).then_some((option, products))
        })
        .collect()
}

fn json_config(product: &Product, children: &[Arc<Product>], attributes: &[Arc<Attribute>]) -> Json {
    let mut attribute_config = Map::new();
    let mut index: Map<String, Json> = Map::new();

    for attribute in attributes {
        let options = used_options(attribute, children);
        for (option, products) in &options {
            for product_id in products {
                let entry = index
                    .entry(product_id.clone())
                    .or_insert_with(|| Json::Object(Map::new()));
                if let Json::Object(selection) = entry {
                    selection.insert(attribute.id.to_string(), Json::String(option.value.clone()));
                }
            }
        }

        let options: Vec<Json> = options
            .into_iter()
            .map(|(option, products)| {
                json!({
                    "id": option.value,
                    "label": option.label,
                    "products": products,
                })
            })
            .collect();

        attribute_config.insert(
            attribute.id.to_string(),
            json!({
                "id": attribute.id.to_string(),
                "code": attribute.code,
                "label": attribute.label(),
                "options": options,
            }),
        );
    }

    json!({
        "attributes": attribute_config,
        "index": index,
        "productId": product.id.to_string(),
    })
}

fn swatch_config(children: &[Arc<Product>], attributes: &[Arc<Attribute>]) -> Json {
    let mut config = Map::new();
    for attribute in attributes.iter().filter(|a| !a.swatches.is_empty()) {
        let mut options = Map::new();
        for (option, _) in used_options(attribute, children) {
            if let Some(swatch) = attribute.swatches.get(&option.value) {
                options.insert(
                    option.value.clone(),
                    json!({"type": swatch.swatch_type.code(), "value": swatch.value}),
                );
            }
        }
        config.insert(attribute.id.to_string(), Json::Object(options));
    }
    Json::Object(config)
}
