use std::collections::HashMap;

use crate::domain::attribute::{Attribute, AttributeSource, OptionText};
use crate::domain::product::Product;
use crate::domain::value::Value;
use crate::error::{FeedError, Result};

/// (attribute code, raw value, product id for product-scoped sources)
type CacheKey = (String, String, Option<i64>);

/// Resolves stored attribute values to their display form.
///
/// Lookups through option sources are memoized for the duration of a pass;
/// call [`ValueProcessor::reset`] between passes.
#[derive(Debug, Default)]
pub struct ValueProcessor {
    cache: HashMap<CacheKey, Value>,
    source_attributes: HashMap<String, bool>,
}

impl ValueProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_value(&mut self, attribute: &Attribute, value: &Value, product: &Product) -> Result<Value> {
        if !self.is_source_attribute(attribute) {
            return Ok(value.clone());
        }
        let Some(source) = &attribute.source else {
            return Ok(value.clone());
        };

        let key = (!value.is_array()).then(|| {
            let scope = matches!(source, AttributeSource::PerProduct(_)).then_some(product.id);
            (attribute.code.clone(), value.to_display_string(), scope)
        });
        if let Some(hit) = key.as_ref().and_then(|k| self.cache.get(k)) {
            return Ok(hit.clone());
        }

        let text = match source {
            AttributeSource::Static(source) => source.option_text(value),
            AttributeSource::PerProduct(source) => {
                let mut fork = source.fork();
                fork.load_options_for(product);
                fork.option_text(value)
            }
        };

        let result = match text {
            None => Value::Null,
            Some(OptionText::Text(text)) => Value::String(text),
            Some(OptionText::Phrase(phrase)) => Value::String(phrase.render()),
            Some(OptionText::Many(labels)) => Value::list(labels.into_iter().map(Value::String)),
            Some(OptionText::Object(kind)) => return Err(FeedError::UnknownValueType(kind)),
        };

        if let Some(key) = key {
            self.cache.insert(key, result.clone());
        }
        Ok(result)
    }

    pub fn reset(&mut self) {
        self.cache.clear();
        self.source_attributes.clear();
    }

    /// Joins values into one string.
    ///
    /// Nested arrays are joined first, booleans render as `true`/`false`, and
    /// blank entries are skipped. Duplicates are kept.
    pub fn to_multi_value_string(values: &[Value], separator: &str) -> String {
        values
            .iter()
            .map(|value| match value {
                Value::Array(entries) => entries
                    .iter()
                    .map(|(_, v)| v.to_display_string())
                    .collect::<Vec<_>>()
                    .join(separator),
                Value::Bool(flag) => flag.to_string(),
                other => other.to_display_string(),
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(separator)
    }

    fn is_source_attribute(&mut self, attribute: &Attribute) -> bool {
        *self
            .source_attributes
            .entry(attribute.code.clone())
            .or_insert_with(|| attribute.uses_source())
    }

    #[cfg(test)]
    pub(crate) fn cached_entries(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::attribute::{AttributeOption, OptionSource, OptionTable, Phrase, ProductOptionSource};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn product(id: i64) -> Product {
        serde_json::from_value(json!({"id": id, "sku": format!("SKU-{id}")})).unwrap()
    }

    #[derive(Debug, Default)]
    struct CountingSource {
        calls: AtomicUsize,
    }

    impl OptionSource for CountingSource {
        fn option_text(&self, value: &Value) -> Option<OptionText> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match value.to_display_string().as_str() {
                "1" => Some(OptionText::Phrase(Phrase::new("Yes"))),
                "obj" => Some(OptionText::Object("stdClass".into())),
                _ => None,
            }
        }

        fn all_options(&self) -> Vec<AttributeOption> {
            Vec::new()
        }
    }

    #[test]
    fn test_attribute_without_source_returns_raw_value() {
        let mut processor = ValueProcessor::new();
        let attribute = Attribute::new(1, "description");
        let value = Value::from("<p>Text</p>");
        assert_eq!(processor.get_value(&attribute, &value, &product(1)).unwrap(), value);
    }

    #[test]
    fn test_static_lookups_are_memoized_until_reset() {
        let source = Arc::new(CountingSource::default());
        let attribute = Attribute::new(2, "is_new").with_source(AttributeSource::Static(source.clone()));
        let mut processor = ValueProcessor::new();

        for _ in 0..3 {
            let value = processor.get_value(&attribute, &Value::Int(1), &product(1)).unwrap();
            assert_eq!(value, Value::from("Yes"));
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        processor.reset();
        assert_eq!(processor.cached_entries(), 0);
        processor.get_value(&attribute, &Value::Int(1), &product(1)).unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_array_values_are_not_cached() {
        let source = Arc::new(CountingSource::default());
        let attribute = Attribute::new(2, "is_new").with_source(AttributeSource::Static(source));
        let mut processor = ValueProcessor::new();
        let value = Value::list(vec![Value::Int(1)]);
        processor.get_value(&attribute, &value, &product(1)).unwrap();
        assert_eq!(processor.cached_entries(), 0);
    }

    #[test]
    fn test_unknown_object_is_an_error() {
        let attribute = Attribute::new(3, "weird")
            .with_source(AttributeSource::Static(Arc::new(CountingSource::default())));
        let err = ValueProcessor::new()
            .get_value(&attribute, &Value::from("obj"), &product(1))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown value object type stdClass");
    }

    #[test]
    fn test_multiselect_resolves_to_label_list() {
        let table = OptionTable::new(vec![
            AttributeOption { value: "1".into(), label: "Climbing".into() },
            AttributeOption { value: "2".into(), label: "Rafting".into() },
        ]);
        let attribute = Attribute::new(4, "activity").with_source(AttributeSource::Static(Arc::new(table)));
        let value = ValueProcessor::new()
            .get_value(&attribute, &Value::from("1,2"), &product(1))
            .unwrap();
        assert_eq!(value, Value::list(vec!["Climbing".into(), "Rafting".into()]));
    }

    #[test]
    fn test_product_scoped_source_does_not_leak_between_products() {
        use crate::domain::attribute::ProductScopedOptions;

        let mut by_product = BTreeMap::new();
        by_product.insert(1, vec![AttributeOption { value: "x".into(), label: "One".into() }]);
        by_product.insert(2, vec![AttributeOption { value: "x".into(), label: "Two".into() }]);
        let source: Arc<dyn ProductOptionSource> = Arc::new(ProductScopedOptions::new(by_product));
        let attribute = Attribute::new(5, "bundle_option").with_source(AttributeSource::PerProduct(source));

        let mut processor = ValueProcessor::new();
        let value = Value::from("x");
        assert_eq!(processor.get_value(&attribute, &value, &product(1)).unwrap(), Value::from("One"));
        assert_eq!(processor.get_value(&attribute, &value, &product(2)).unwrap(), Value::from("Two"));
    }

    fn join(values: serde_json::Value, separator: &str) -> String {
        let values: Vec<Value> = match Value::from(values) {
            Value::Array(entries) => entries.into_iter().map(|(_, v)| v).collect(),
            other => vec![other],
        };
        ValueProcessor::to_multi_value_string(&values, separator)
    }

    #[test]
    fn test_multi_value_string() {
        assert_eq!(join(json!(["Red", "Red", "Yellow"]), "|"), "Red|Red|Yellow");
        assert_eq!(join(json!([false, "Yellow", "false", "FALSE"]), "|"), "false|Yellow|false|FALSE");
        assert_eq!(join(json!([true, false, 1, 0, "true", "false"]), "|"), "true|false|1|0|true|false");
        assert_eq!(join(json!([1200.0, 1500.0]), "$"), "1200$1500");
        assert_eq!(join(json!(["", null, "Chocolate", " Butter Scotch "]), "|"), "Chocolate|Butter Scotch");
        assert_eq!(join(json!([]), "|"), "");
        assert_eq!(join(json!(["Żubrówka", "<p>Short</p>"]), ","), "Żubrówka,<p>Short</p>");
    }

    #[test]
    fn test_multi_value_string_joins_nested_arrays() {
        assert_eq!(
            join(json!([[""], ["Climbing", "Rafting"], ["Swimming", "Cycling"]]), ","),
            "Climbing,Rafting,Swimming,Cycling"
        );
    }
}
