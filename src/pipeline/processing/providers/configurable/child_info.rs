use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::constants::{
    is_price_like, CHILD_FINAL_PRICE_FIELD, CHILD_INFO_FIELD, CHILD_MAXIMAL_PRICE_FIELD,
    CHILD_MINIMAL_PRICE_FIELD, COST_CODE, FINAL_PRICE_CODE, MAXIMAL_PRICE_CODE, MINIMAL_PRICE_CODE,
    PRICE_CODE, SPECIAL_PRICE_CODE, TIER_PRICE_CODE,
};
use crate::domain::attribute::Attribute;
use crate::domain::product::{Product, ProductRow};
use crate::domain::specification::FeedSpecification;
use crate::domain::value::{Key, Value};
use crate::error::Result;
use crate::observability::metrics;
use crate::pipeline::processing::normalize::ValueNormalizer;
use crate::pipeline::processing::providers::prices::{PriceMap, PriceProviderResolver};
use crate::pipeline::processing::providers::stock::StockResolver;
use crate::pipeline::processing::value_processor::ValueProcessor;

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").expect("numeric pattern is valid")
});

/// One attribute of a variant as exported in `child_info`
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub code: String,
    pub label: String,
    pub value: Value,
}

impl AttributeRow {
    pub fn to_value(&self) -> Value {
        Value::map([
            ("code", Value::from(self.code.as_str())),
            ("label", Value::from(self.label.as_str())),
            ("value", self.value.clone()),
        ])
    }
}

/// One variant of a configurable product
#[derive(Debug, Clone, PartialEq)]
pub struct ChildInfo {
    pub variant_id: i64,
    pub variant_sku: String,
    pub attributes: Vec<AttributeRow>,
    pub final_price: Option<f64>,
    pub minimal_price: Option<f64>,
    pub maximal_price: Option<f64>,
}

impl ChildInfo {
    fn new(variant_id: i64, variant_sku: String) -> Self {
        Self {
            variant_id,
            variant_sku,
            attributes: Vec::new(),
            final_price: None,
            minimal_price: None,
            maximal_price: None,
        }
    }

    /// Price keys are only present when set
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            (Key::from("variant_id"), Value::Int(self.variant_id)),
            (Key::from("variant_sku"), Value::from(self.variant_sku.as_str())),
            (
                Key::from("attributes"),
                Value::list(self.attributes.iter().map(AttributeRow::to_value)),
            ),
        ];
        let prices = [
            (FINAL_PRICE_CODE, self.final_price),
            (MINIMAL_PRICE_CODE, self.minimal_price),
            (MAXIMAL_PRICE_CODE, self.maximal_price),
        ];
        for (key, price) in prices {
            if let Some(price) = price {
                entries.push((Key::from(key), Value::Float(price)));
            }
        }
        Value::Array(entries)
    }
}

/// Inputs available to [`ChildRowHook::customize_attribute_row`]
#[derive(Debug)]
pub struct AttributeContext<'a> {
    pub spec: &'a FeedSpecification,
    pub provider_prices: &'a PriceMap,
    pub original_code: &'a str,
    pub original_label: &'a str,
    pub pre_normalized: &'a Value,
}

/// Inputs available to [`ChildRowHook::customize_child_row`]
#[derive(Debug)]
pub struct ChildContext<'a> {
    pub spec: &'a FeedSpecification,
    pub provider_prices: &'a PriceMap,
    pub attribute_count: usize,
}

/// Extension point over built child rows. Returning `None` drops the entry.
pub trait ChildRowHook: Send + Sync {
    fn customize_attribute_row(
        &self,
        _child: &Product,
        _attribute: &Attribute,
        _context: &AttributeContext<'_>,
        row: AttributeRow,
    ) -> Option<AttributeRow> {
        Some(row)
    }

    fn customize_child_row(&self, _child: &Product, _context: &ChildContext<'_>, row: ChildInfo) -> Option<ChildInfo> {
        Some(row)
    }
}

/// Builds `child_info` entries for the variants of a configurable product
pub struct BuildChildProductInfo {
    value_processor: ValueProcessor,
    normalizer: ValueNormalizer,
    prices: Arc<PriceProviderResolver>,
    stock: Arc<dyn StockResolver>,
    exclude_disabled: bool,
    hooks: Vec<Box<dyn ChildRowHook>>,
}

impl BuildChildProductInfo {
    pub fn new(prices: Arc<PriceProviderResolver>, stock: Arc<dyn StockResolver>) -> Self {
        Self {
            value_processor: ValueProcessor::new(),
            normalizer: ValueNormalizer::new(),
            prices,
            stock,
            exclude_disabled: true,
            hooks: Vec::new(),
        }
    }

    pub fn exclude_disabled(mut self, exclude_disabled: bool) -> Self {
        self.exclude_disabled = exclude_disabled;
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn ChildRowHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn reset(&mut self) {
        self.value_processor.reset();
    }

    pub fn build_children(
        &mut self,
        children: &[Arc<Product>],
        attributes: &[Arc<Attribute>],
        spec: &FeedSpecification,
    ) -> Result<Vec<ChildInfo>> {
        let mut seen_ids = HashSet::new();
        let mut seen_skus = HashSet::new();
        let mut built = Vec::new();

        for child in children {
            if self.exclude_disabled && !child.is_enabled() {
                metrics::provider::child_skipped("disabled");
                continue;
            }
            if !spec.include_out_of_stock && !self.stock.is_salable(child) {
                metrics::provider::child_skipped("out_of_stock");
                continue;
            }

            let variant_id = child.id;
            let variant_sku = child.sku.clone();
            if (variant_id != 0 && seen_ids.contains(&variant_id))
                || (!variant_sku.is_empty() && seen_skus.contains(&variant_sku))
            {
                metrics::provider::child_skipped("duplicate");
                continue;
            }
            if variant_id != 0 {
                seen_ids.insert(variant_id);
            }
            if !variant_sku.is_empty() {
                seen_skus.insert(variant_sku.clone());
            }

            let mut row = ChildInfo::new(variant_id, variant_sku);

            let provider_prices = if spec.include_child_prices {
                self.prices
                    .resolve(child)
                    .map(|provider| provider.get_prices(child, &[]))
                    .unwrap_or_default()
            } else {
                PriceMap::default()
            };

            if spec.include_child_prices {
                if let Some(final_price) = provider_prices.final_price {
                    if !spec.is_ignored(CHILD_FINAL_PRICE_FIELD) {
                        row.final_price = Some(final_price);
                    }
                    if !spec.is_ignored(CHILD_MINIMAL_PRICE_FIELD) {
                        row.minimal_price = Some(final_price);
                    }
                }
                if let Some(max_price) = provider_prices.max_price {
                    if !spec.is_ignored(CHILD_MAXIMAL_PRICE_FIELD) {
                        row.maximal_price = Some(max_price);
                    }
                }
            }

            for attribute in attributes {
                if let Some(attribute_row) = self.build_attribute(child, attribute, spec, &provider_prices)? {
                    row.attributes.push(attribute_row);
                }
            }

            let context = ChildContext {
                spec,
                provider_prices: &provider_prices,
                attribute_count: row.attributes.len(),
            };
            let customized = self
                .hooks
                .iter()
                .try_fold(row, |row, hook| hook.customize_child_row(child, &context, row));

            if let Some(row) = customized {
                built.push(row);
            }
        }

        metrics::provider::children_built(built.len() as u64);
        Ok(built)
    }

    /// Appends the built children to `child_info`, replacing a value that is not an array
    pub fn execute(
        &mut self,
        row: &mut ProductRow,
        children: &[Arc<Product>],
        attributes: &[Arc<Attribute>],
        spec: &FeedSpecification,
    ) -> Result<()> {
        let built = self.build_children(children, attributes, spec)?;

        let mut merged: Vec<Value> = match row.get(CHILD_INFO_FIELD) {
            Some(Value::Array(entries)) => entries.iter().map(|(_, v)| v.clone()).collect(),
            _ => Vec::new(),
        };
        merged.extend(built.iter().map(ChildInfo::to_value));
        row.set(CHILD_INFO_FIELD, Value::list(merged));
        Ok(())
    }

    fn build_attribute(
        &mut self,
        child: &Product,
        attribute: &Attribute,
        spec: &FeedSpecification,
        provider_prices: &PriceMap,
    ) -> Result<Option<AttributeRow>> {
        let code = attribute.code.as_str();
        if spec.is_ignored(code)
            || (code == TIER_PRICE_CODE && !spec.include_tier_pricing)
            || (is_price_like(code) && !spec.include_child_prices)
        {
            return Ok(None);
        }

        let original_label = attribute.label();
        let (out_code, out_label) = map_attribute_meta(spec, code, &original_label);

        let raw = child.attribute_value(code);
        let value = match code {
            FINAL_PRICE_CODE | MINIMAL_PRICE_CODE => provider_prices.final_price.map(Value::Float),
            MAXIMAL_PRICE_CODE => provider_prices.max_price.map(Value::Float),
            PRICE_CODE => provider_prices.regular_price.map(Value::Float),
            SPECIAL_PRICE_CODE | COST_CODE => self
                .normalizer
                .normalize(raw.clone(), code)
                .map(numeric_string_to_float),
            _ => {
                let resolved = self.value_processor.get_value(attribute, &raw, child)?;
                self.normalizer.normalize(resolved, code)
            }
        };
        let Some(value) = value else {
            return Ok(None);
        };

        let pre_normalized = match code {
            FINAL_PRICE_CODE | MINIMAL_PRICE_CODE | MAXIMAL_PRICE_CODE | PRICE_CODE => value.clone(),
            _ => raw,
        };
        let context = AttributeContext {
            spec,
            provider_prices,
            original_code: code,
            original_label: &original_label,
            pre_normalized: &pre_normalized,
        };
        let row = AttributeRow {
            code: out_code,
            label: out_label,
            value,
        };
        Ok(self
            .hooks
            .iter()
            .try_fold(row, |row, hook| hook.customize_attribute_row(child, attribute, &context, row)))
    }
}

fn map_attribute_meta(spec: &FeedSpecification, code: &str, label: &str) -> (String, String) {
    let Some(mapping) = spec.mapping_for(code) else {
        return (code.to_string(), label.to_string());
    };
    let out_code = mapping.code().filter(|c| !c.is_empty()).unwrap_or(code);
    let out_label = mapping.label().filter(|l| !l.is_empty()).unwrap_or(label);
    (out_code.to_string(), out_label.to_string())
}

fn numeric_string_to_float(value: Value) -> Value {
    let parsed = match &value {
        Value::String(s) if NUMERIC.is_match(s) => s.parse::<f64>().ok(),
        _ => None,
    };
    parsed.map(Value::Float).unwrap_or(value)
}
