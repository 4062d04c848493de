use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::app::ports::{
    AttributeRepository, CatalogSource, ChildCatalog, CollectionQuery, MediaGallerySource, RatingSource,
    RatingSummary,
};
use crate::constants::{CHILD_DEFAULT_ATTRIBUTES, PRICE_LIKE_CODES, SPECIAL_FROM_DATE_CODE, SPECIAL_TO_DATE_CODE};
use crate::domain::attribute::{Attribute, AttributeOption, AttributeSource, OptionTable, ProductScopedOptions, Swatch};
use crate::domain::product::{MediaEntry, Product};
use crate::error::{FeedError, Result};

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct AttributeFixture {
    id: i64,
    code: String,
    #[serde(default)]
    store_label: Option<String>,
    #[serde(default)]
    frontend_label: Option<String>,
    #[serde(default)]
    options: Option<Vec<AttributeOption>>,
    /// Product id to options, for sources that depend on the product
    #[serde(default)]
    per_product_options: Option<BTreeMap<i64, Vec<AttributeOption>>>,
    #[serde(default)]
    swatches: BTreeMap<String, Swatch>,
    /// Exported as a feed column
    #[serde(default = "default_true")]
    in_feed: bool,
}

impl AttributeFixture {
    fn into_attribute(self) -> (Attribute, bool) {
        let mut attribute = Attribute::new(self.id, self.code)
            .with_labels(self.store_label.as_deref(), self.frontend_label.as_deref());
        if let Some(by_product) = self.per_product_options {
            attribute = attribute.with_source(AttributeSource::PerProduct(Arc::new(ProductScopedOptions::new(by_product))));
        } else if let Some(options) = self.options {
            attribute = attribute.with_source(AttributeSource::Static(Arc::new(OptionTable::new(options))));
        }
        attribute.swatches = self.swatches;
        (attribute, self.in_feed)
    }
}

#[derive(Debug, Deserialize)]
struct ConfigurableFixture {
    attributes: Vec<String>,
    #[serde(default)]
    children: Vec<Product>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CatalogFixture {
    attributes: Vec<AttributeFixture>,
    products: Vec<Product>,
    /// Keyed by parent link id
    configurable: BTreeMap<i64, ConfigurableFixture>,
    media_gallery: BTreeMap<i64, Vec<MediaEntry>>,
    ratings: BTreeMap<i64, RatingSummary>,
}

/// Catalog adapter over a JSON document, serving every read port
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    feed_attributes: Vec<Arc<Attribute>>,
    attributes_by_code: BTreeMap<String, Arc<Attribute>>,
    products: Vec<Product>,
    configurable: BTreeMap<i64, (Vec<Arc<Attribute>>, Vec<Product>)>,
    media_gallery: BTreeMap<i64, Vec<MediaEntry>>,
    ratings: BTreeMap<i64, RatingSummary>,
}

impl InMemoryCatalog {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| FeedError::Catalog(format!("cannot read catalog {}: {e}", path.display())))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let fixture: CatalogFixture = serde_json::from_str(content)?;
        Self::from_fixture(fixture)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let fixture: CatalogFixture = serde_json::from_value(value)?;
        Self::from_fixture(fixture)
    }

    fn from_fixture(fixture: CatalogFixture) -> Result<Self> {
        let mut feed_attributes = Vec::new();
        let mut attributes_by_code = BTreeMap::new();
        for attribute in fixture.attributes {
            let (attribute, in_feed) = attribute.into_attribute();
            let attribute = Arc::new(attribute);
            if in_feed {
                feed_attributes.push(attribute.clone());
            }
            attributes_by_code.insert(attribute.code.clone(), attribute);
        }

        let mut configurable = BTreeMap::new();
        for (parent_id, entry) in fixture.configurable {
            let attributes = entry
                .attributes
                .iter()
                .map(|code| {
                    attributes_by_code.get(code).cloned().ok_or_else(|| {
                        FeedError::Catalog(format!("parent {parent_id} is configured by unknown attribute {code}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            configurable.insert(parent_id, (attributes, entry.children));
        }

        debug!(
            products = fixture.products.len(),
            attributes = attributes_by_code.len(),
            parents = configurable.len(),
            "Loaded in-memory catalog"
        );
        Ok(Self {
            feed_attributes,
            attributes_by_code,
            products: fixture.products,
            configurable,
            media_gallery: fixture.media_gallery,
            ratings: fixture.ratings,
        })
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

/// Keeps the selected attribute values plus what pricing and stock always read
fn select_data(product: &Product, codes: &BTreeSet<String>) -> Product {
    let mut selected = product.clone();
    selected.data.retain(|code, _| {
        codes.contains(code)
            || PRICE_LIKE_CODES.contains(&code.as_str())
            || CHILD_DEFAULT_ATTRIBUTES.contains(&code.as_str())
            || code == SPECIAL_FROM_DATE_CODE
            || code == SPECIAL_TO_DATE_CODE
    });
    selected
}

impl CatalogSource for InMemoryCatalog {
    fn load_page(&self, query: &CollectionQuery, page: usize, page_size: usize) -> Result<Vec<Product>> {
        let page = page.max(1);
        Ok(self
            .products
            .iter()
            .filter(|product| {
                query
                    .visibility
                    .as_ref()
                    .map_or(true, |visible| visible.contains(&product.visibility))
            })
            .skip((page - 1) * page_size)
            .take(page_size)
            .map(|product| match &query.attributes {
                Some(codes) => select_data(product, codes),
                None => product.clone(),
            })
            .collect())
    }
}

impl AttributeRepository for InMemoryCatalog {
    fn feed_attributes(&self) -> Result<Vec<Arc<Attribute>>> {
        Ok(self.feed_attributes.clone())
    }
}

impl ChildCatalog for InMemoryCatalog {
    fn children(&self, parent_link_ids: &[i64], attribute_codes: &BTreeSet<String>) -> Result<BTreeMap<i64, Vec<Product>>> {
        Ok(parent_link_ids
            .iter()
            .filter_map(|id| {
                let (_, children) = self.configurable.get(id)?;
                let children = children.iter().map(|child| select_data(child, attribute_codes)).collect();
                Some((*id, children))
            })
            .collect())
    }

    fn configurable_attributes(&self, parent_link_ids: &[i64]) -> Result<BTreeMap<i64, Vec<Arc<Attribute>>>> {
        Ok(parent_link_ids
            .iter()
            .filter_map(|id| {
                let (attributes, _) = self.configurable.get(id)?;
                Some((*id, attributes.clone()))
            })
            .collect())
    }
}

impl MediaGallerySource for InMemoryCatalog {
    fn gallery(&self, product_ids: &[i64]) -> Result<BTreeMap<i64, Vec<MediaEntry>>> {
        Ok(product_ids
            .iter()
            .filter_map(|id| self.media_gallery.get(id).map(|entries| (*id, entries.clone())))
            .collect())
    }
}

impl RatingSource for InMemoryCatalog {
    fn summaries(&self, product_ids: &[i64], _store_code: &str) -> Result<BTreeMap<i64, RatingSummary>> {
        Ok(product_ids
            .iter()
            .filter_map(|id| self.ratings.get(id).map(|summary| (*id, *summary)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_value(json!({
            "attributes": [
                {"id": 73, "code": "name"},
                {"id": 93, "code": "color", "options": [{"value": "49", "label": "Black"}],
                 "swatches": {"49": {"type": "color", "value": "#000000"}}},
                {"id": 99, "code": "internal_note", "in_feed": false}
            ],
            "products": [
                {"id": 1, "sku": "A", "data": {"name": "Tee", "price": 10.0, "internal_note": "x"}},
                {"id": 2, "sku": "B", "visibility": 1},
                {"id": 3, "sku": "C"}
            ],
            "configurable": {
                "3": {"attributes": ["color"], "children": [{"id": 4, "sku": "C-1", "data": {"color": "49", "weight": 1}}]}
            },
            "ratings": {"1": {"rating_summary": 80.0, "reviews_count": 10}}
        }))
        .unwrap()
    }

    #[test]
    fn test_pages_respect_visibility_and_selection() {
        let catalog = catalog();
        let mut query = CollectionQuery::new("default");
        query.visibility = Some(vec![2, 3, 4]);
        query.select_attributes(["name"]);

        let first = catalog.load_page(&query, 1, 1).unwrap();
        let second = catalog.load_page(&query, 2, 1).unwrap();
        let third = catalog.load_page(&query, 3, 1).unwrap();

        assert_eq!(first[0].sku, "A");
        assert!(first[0].data.contains_key("price"));
        assert!(!first[0].data.contains_key("internal_note"));
        assert_eq!(second[0].sku, "C");
        assert!(third.is_empty());
    }

    #[test]
    fn test_feed_attributes_skip_hidden() {
        let codes: Vec<String> = catalog().feed_attributes().unwrap().iter().map(|a| a.code.clone()).collect();
        assert_eq!(codes, vec!["name", "color"]);
    }

    #[test]
    fn test_children_and_configurable_attributes() {
        let catalog = catalog();
        let codes: BTreeSet<String> = ["color".to_string()].into_iter().collect();

        let children = catalog.children(&[3, 1], &codes).unwrap();
        let attributes = catalog.configurable_attributes(&[3]).unwrap();

        assert_eq!(children.len(), 1);
        assert!(children[&3][0].data.contains_key("color"));
        assert!(!children[&3][0].data.contains_key("weight"));
        assert_eq!(attributes[&3][0].swatches.len(), 1);
    }

    #[test]
    fn test_unknown_configurable_attribute_is_rejected() {
        let err = InMemoryCatalog::from_value(json!({
            "configurable": {"3": {"attributes": ["size"]}}
        }))
        .unwrap_err();
        assert!(matches!(err, FeedError::Catalog(_)));
    }

    #[test]
    fn test_rating_lookup() {
        let summaries = catalog().summaries(&[1, 2], "default").unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[&1].reviews_count, 10);
    }
}
