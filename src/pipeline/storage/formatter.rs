use std::collections::BTreeMap;

use crate::constants::{FORMAT_CSV, FORMAT_JSON};
use crate::domain::product::{FeedRecord, ProductRow};
use crate::domain::specification::FeedSpecification;
use crate::domain::value::Value;
use crate::error::Result;
use crate::pipeline::processing::value_processor::ValueProcessor;

/// Turns rows into records a feed file can write
pub trait Formatter: Send + Sync {
    fn format(&self, rows: Vec<ProductRow>, spec: &FeedSpecification) -> Result<Vec<FeedRecord>>;
}

/// Rows pass through unchanged apart from dropping the model reference
#[derive(Debug, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format(&self, rows: Vec<ProductRow>, _spec: &FeedSpecification) -> Result<Vec<FeedRecord>> {
        Ok(rows.into_iter().map(ProductRow::into_record).collect())
    }
}

/// Every value flattened to a single cell.
///
/// Lists of scalars are joined with the multi-valued separator; anything
/// nested deeper is JSON-encoded.
#[derive(Debug, Default)]
pub struct CsvFormatter;

impl CsvFormatter {
    fn flatten(value: &Value, separator: &str) -> Value {
        match value {
            Value::Null => Value::String(String::new()),
            Value::Array(entries) if entries.iter().all(|(_, v)| !v.is_array()) && value.is_list() => {
                let items: Vec<Value> = entries.iter().map(|(_, v)| v.clone()).collect();
                Value::String(ValueProcessor::to_multi_value_string(&items, separator))
            }
            Value::Array(_) => Value::String(value.to_json().to_string()),
            scalar => Value::String(scalar.to_display_string()),
        }
    }
}

impl Formatter for CsvFormatter {
    fn format(&self, rows: Vec<ProductRow>, spec: &FeedSpecification) -> Result<Vec<FeedRecord>> {
        Ok(rows
            .into_iter()
            .map(|row| {
                let fields = row
                    .into_record()
                    .fields()
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::flatten(v, &spec.multi_valued_separator)))
                    .collect();
                FeedRecord::new(fields)
            })
            .collect())
    }
}

/// Formatters by format code
pub struct FormatterPool {
    formatters: BTreeMap<String, Box<dyn Formatter>>,
}

impl Default for FormatterPool {
    fn default() -> Self {
        Self::empty()
            .register(FORMAT_JSON, Box::new(JsonFormatter))
            .register(FORMAT_CSV, Box::new(CsvFormatter))
    }
}

impl FormatterPool {
    pub fn empty() -> Self {
        Self {
            formatters: BTreeMap::new(),
        }
    }

    pub fn register(mut self, format: &str, formatter: Box<dyn Formatter>) -> Self {
        self.formatters.insert(format.to_string(), formatter);
        self
    }

    pub fn get(&self, format: &str) -> Option<&dyn Formatter> {
        self.formatters.get(format).map(|formatter| formatter.as_ref())
    }
}
