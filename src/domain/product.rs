use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::constants::{ENTITY_ID_FIELD, NAME_CODE, PRODUCT_MODEL_FIELD, SKU_FIELD, STATUS_CODE, TYPE_ID_FIELD};
use crate::domain::value::Value;

pub const STATUS_ENABLED: i64 = 1;
pub const STATUS_DISABLED: i64 = 2;

pub const VISIBILITY_NOT_VISIBLE: i64 = 1;
pub const VISIBILITY_IN_CATALOG: i64 = 2;
pub const VISIBILITY_IN_SEARCH: i64 = 3;
pub const VISIBILITY_BOTH: i64 = 4;

/// Visibilities that show the product somewhere in the storefront
pub const VISIBLE_IN_SITE: [i64; 3] = [VISIBILITY_IN_CATALOG, VISIBILITY_IN_SEARCH, VISIBILITY_BOTH];

/// Catalog product type; unknown codes are kept verbatim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(from = "String")]
pub enum ProductType {
    #[default]
    Simple,
    Virtual,
    Configurable,
    Bundle,
    Grouped,
    Other(String),
}

impl ProductType {
    pub fn as_str(&self) -> &str {
        match self {
            ProductType::Simple => "simple",
            ProductType::Virtual => "virtual",
            ProductType::Configurable => "configurable",
            ProductType::Bundle => "bundle",
            ProductType::Grouped => "grouped",
            ProductType::Other(code) => code,
        }
    }
}

impl From<String> for ProductType {
    fn from(code: String) -> Self {
        match code.as_str() {
            "simple" => ProductType::Simple,
            "virtual" => ProductType::Virtual,
            "configurable" => ProductType::Configurable,
            "bundle" => ProductType::Bundle,
            "grouped" => ProductType::Grouped,
            _ => ProductType::Other(code),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-source inventory record
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceItem {
    pub source_code: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub in_stock: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Stock information attached to a product.
///
/// `qty` and `is_in_stock` are the legacy single stock item; `source_items`
/// and `reservations` are only meaningful with multi-source inventory.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StockData {
    pub qty: f64,
    pub is_in_stock: bool,
    pub source_items: Vec<SourceItem>,
    /// Sum of pending reservations; negative while orders are unshipped
    pub reservations: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaEntry {
    pub file: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub position: i64,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_media_type")]
    pub media_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Product {
    pub id: i64,
    /// Link field used by staged catalogs; falls back to `id`
    #[serde(default)]
    pub row_id: Option<i64>,
    pub sku: String,
    #[serde(default)]
    pub type_id: ProductType,
    #[serde(default = "default_status")]
    pub status: i64,
    #[serde(default = "default_visibility")]
    pub visibility: i64,
    #[serde(default)]
    pub data: BTreeMap<String, Value>,
    #[serde(default)]
    pub stock: StockData,
    #[serde(default)]
    pub media_gallery: Option<Vec<MediaEntry>>,
}

impl Product {
    pub fn link_id(&self) -> i64 {
        self.row_id.unwrap_or(self.id)
    }

    pub fn is_enabled(&self) -> bool {
        self.status == STATUS_ENABLED
    }

    pub fn is_configurable(&self) -> bool {
        self.type_id == ProductType::Configurable
    }

    pub fn name(&self) -> Option<&str> {
        self.data.get(NAME_CODE).and_then(Value::as_str)
    }

    /// Raw stored value for an attribute code, including the core columns
    pub fn attribute_value(&self, code: &str) -> Value {
        match code {
            SKU_FIELD => Value::from(self.sku.as_str()),
            STATUS_CODE => Value::Int(self.status),
            TYPE_ID_FIELD => Value::from(self.type_id.as_str()),
            "visibility" => Value::Int(self.visibility),
            _ => self.data.get(code).cloned().unwrap_or_default(),
        }
    }
}

/// A feed row under construction.
///
/// Fields keep insertion order; replacing a field keeps its position. The row
/// only holds a weak reference to its product so that dropping the page drops
/// the models even if a row outlives it.
#[derive(Debug, Clone, Default)]
pub struct ProductRow {
    fields: Vec<(String, Value)>,
    product: Weak<Product>,
}

impl ProductRow {
    pub fn from_product(product: &Arc<Product>) -> Self {
        let mut row = Self {
            fields: Vec::new(),
            product: Arc::downgrade(product),
        };
        row.set(ENTITY_ID_FIELD, Value::Int(product.id));
        row.set(SKU_FIELD, Value::from(product.sku.as_str()));
        row.set(TYPE_ID_FIELD, Value::from(product.type_id.as_str()));
        row
    }

    pub fn model(&self) -> Option<Arc<Product>> {
        self.product.upgrade()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.fields.iter_mut().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.get(field).is_some()
    }

    /// Replaces the value in place, or appends a new field
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        let field = field.into();
        let value = value.into();
        match self.get_mut(&field) {
            Some(slot) => *slot = value,
            None => self.fields.push((field, value)),
        }
    }

    /// Appends to a list field, creating it when missing
    pub fn push_to_list(&mut self, field: &str, value: impl Into<Value>) {
        match self.get_mut(field) {
            Some(slot) => slot.push(value.into()),
            None => self.fields.push((field.to_string(), Value::list([value.into()]))),
        }
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        let position = self.fields.iter().position(|(k, _)| k == field)?;
        Some(self.fields.remove(position).1)
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn entity_id(&self) -> Option<i64> {
        self.get(ENTITY_ID_FIELD).and_then(Value::as_i64)
    }

    pub fn type_id(&self) -> Option<&str> {
        self.get(TYPE_ID_FIELD).and_then(Value::as_str)
    }

    /// Drops the product reference and any literal `product_model` field
    pub fn into_record(self) -> FeedRecord {
        FeedRecord {
            fields: self
                .fields
                .into_iter()
                .filter(|(k, _)| k != PRODUCT_MODEL_FIELD)
                .collect(),
        }
    }
}

/// Formatter input: an ordered, serializable record with no model reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedRecord {
    fields: Vec<(String, Value)>,
}

impl FeedRecord {
    pub fn new(fields: Vec<(String, Value)>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == field).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for FeedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

fn default_true() -> bool {
    true
}

fn default_status() -> i64 {
    STATUS_ENABLED
}

fn default_visibility() -> i64 {
    VISIBILITY_BOTH
}

fn default_media_type() -> String {
    "image".to_string()
}
