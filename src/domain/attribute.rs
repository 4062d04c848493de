use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::product::Product;
use crate::domain::value::Value;

/// Translatable label with positional `%1`, `%2`... placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phrase {
    text: String,
    arguments: Vec<String>,
}

impl Phrase {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            arguments: Vec::new(),
        }
    }

    pub fn with_arguments(text: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            text: text.into(),
            arguments,
        }
    }

    pub fn render(&self) -> String {
        // Highest index first so %1 does not clobber %10
        self.arguments
            .iter()
            .enumerate()
            .rev()
            .fold(self.text.clone(), |text, (index, argument)| {
                text.replace(&format!("%{}", index + 1), argument)
            })
    }
}

impl fmt::Display for Phrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// What an option source hands back for a stored value
#[derive(Debug, Clone, PartialEq)]
pub enum OptionText {
    Text(String),
    Phrase(Phrase),
    /// Multi-select values resolve to one label per selected option
    Many(Vec<String>),
    /// A label object the pipeline does not know how to render
    Object(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeOption {
    pub value: String,
    pub label: String,
}

/// Option table shared by every product
pub trait OptionSource: fmt::Debug + Send + Sync {
    /// `None` when the value matches no option
    fn option_text(&self, value: &Value) -> Option<OptionText>;

    fn all_options(&self) -> Vec<AttributeOption>;
}

/// Option table whose content depends on the product being exported.
///
/// Implementations are never queried directly: callers fork a private copy,
/// load it for one product and query the copy.
pub trait ProductOptionSource: fmt::Debug + Send + Sync {
    fn fork(&self) -> Box<dyn ProductOptionSource>;

    fn load_options_for(&mut self, product: &Product);

    fn option_text(&self, value: &Value) -> Option<OptionText>;
}

#[derive(Debug, Clone)]
pub enum AttributeSource {
    Static(Arc<dyn OptionSource>),
    PerProduct(Arc<dyn ProductOptionSource>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwatchType {
    Text,
    Color,
    Image,
}

impl SwatchType {
    /// Numeric code used in swatch JSON config
    pub fn code(&self) -> u8 {
        match self {
            SwatchType::Text => 0,
            SwatchType::Color => 1,
            SwatchType::Image => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Swatch {
    #[serde(rename = "type")]
    pub swatch_type: SwatchType,
    pub value: String,
}

/// Catalog attribute metadata
#[derive(Debug, Clone)]
pub struct Attribute {
    pub id: i64,
    pub code: String,
    pub store_label: Option<String>,
    pub frontend_label: Option<String>,
    pub source: Option<AttributeSource>,
    /// Swatches keyed by option value
    pub swatches: BTreeMap<String, Swatch>,
}

impl Attribute {
    pub fn new(id: i64, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
            store_label: None,
            frontend_label: None,
            source: None,
            swatches: BTreeMap::new(),
        }
    }

    pub fn with_labels(mut self, store_label: Option<&str>, frontend_label: Option<&str>) -> Self {
        self.store_label = store_label.map(str::to_string);
        self.frontend_label = frontend_label.map(str::to_string);
        self
    }

    pub fn with_source(mut self, source: AttributeSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn uses_source(&self) -> bool {
        self.source.is_some()
    }

    /// Store label, then admin label, then the code with an upper-cased first letter
    pub fn label(&self) -> String {
        [&self.store_label, &self.frontend_label]
            .into_iter()
            .flatten()
            .find(|label| !label.is_empty())
            .cloned()
            .unwrap_or_else(|| upper_first(&self.code))
    }

    /// Options of a static source; per-product sources expose none
    pub fn options(&self) -> Vec<AttributeOption> {
        match &self.source {
            Some(AttributeSource::Static(source)) => source.all_options(),
            _ => Vec::new(),
        }
    }
}

fn upper_first(code: &str) -> String {
    let mut chars = code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Static option table, the usual select/multiselect source
#[derive(Debug, Clone, Default)]
pub struct OptionTable {
    options: Vec<AttributeOption>,
}

impl OptionTable {
    pub fn new(options: Vec<AttributeOption>) -> Self {
        Self { options }
    }

    fn label_for(&self, value: &str) -> Option<&str> {
        self.options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label.as_str())
    }
}

impl OptionSource for OptionTable {
    fn option_text(&self, value: &Value) -> Option<OptionText> {
        lookup_labels(value, |key| self.label_for(key).map(str::to_string))
    }

    fn all_options(&self) -> Vec<AttributeOption> {
        self.options.clone()
    }
}

/// Options keyed by product id; a fork only sees the product it was loaded for
#[derive(Debug, Clone, Default)]
pub struct ProductScopedOptions {
    by_product: BTreeMap<i64, Vec<AttributeOption>>,
    loaded: Vec<AttributeOption>,
}

impl ProductScopedOptions {
    pub fn new(by_product: BTreeMap<i64, Vec<AttributeOption>>) -> Self {
        Self {
            by_product,
            loaded: Vec::new(),
        }
    }
}

impl ProductOptionSource for ProductScopedOptions {
    fn fork(&self) -> Box<dyn ProductOptionSource> {
        Box::new(Self {
            by_product: self.by_product.clone(),
            loaded: Vec::new(),
        })
    }

    fn load_options_for(&mut self, product: &Product) {
        self.loaded = self.by_product.get(&product.id).cloned().unwrap_or_default();
    }

    fn option_text(&self, value: &Value) -> Option<OptionText> {
        lookup_labels(value, |key| {
            self.loaded
                .iter()
                .find(|option| option.value == key)
                .map(|option| Phrase::new(option.label.clone()).render())
        })
    }
}

/// Comma separated values are multi-select selections
fn lookup_labels<F>(value: &Value, label_for: F) -> Option<OptionText>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = match value {
        Value::Null | Value::Array(_) => return None,
        other => other.to_display_string(),
    };
    if raw.contains(',') {
        let labels: Vec<String> = raw.split(',').filter_map(|v| label_for(v.trim())).collect();
        return (!labels.is_empty()).then_some(OptionText::Many(labels));
    }
    label_for(raw.trim()).map(OptionText::Text)
}
