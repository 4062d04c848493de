use tracing::warn;

use crate::domain::value::{Key, Value};
use crate::observability::metrics;

/// Deepest nesting accepted before a value is rejected
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, thiserror::Error)]
#[error("value nested deeper than {0} levels")]
struct DepthExceeded(usize);

/// Cleans attribute values before they reach a feed row.
///
/// Strings are trimmed and blank strings become null. Arrays are trimmed and
/// stripped of nulls recursively; an array holding nothing but empty arrays
/// becomes null; a flat list of scalars is deduplicated by string form and
/// reindexed; any other structure only has its integer-keyed arrays
/// reindexed. Normalization never fails: a rejected value is logged and
/// dropped.
#[derive(Debug, Clone)]
pub struct ValueNormalizer {
    max_depth: usize,
}

impl Default for ValueNormalizer {
    fn default() -> Self {
        Self { max_depth: MAX_DEPTH }
    }
}

impl ValueNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Returns `None` when the value should be left out of the feed
    pub fn normalize(&self, value: Value, attribute_code: &str) -> Option<Value> {
        let normalized = match value {
            Value::Null => return None,
            Value::String(s) => trim(s),
            Value::Array(_) => {
                let summary = safe_context_value(&value);
                match self.normalize_array(value) {
                    Ok(normalized) => normalized,
                    Err(e) => {
                        warn!(
                            attribute = attribute_code,
                            value = %summary,
                            error = %e,
                            "Skipping attribute, value could not be normalized"
                        );
                        metrics::normalize::warning();
                        None
                    }
                }
            }
            other => Some(other),
        };

        if normalized.is_none() {
            metrics::normalize::value_dropped();
        }
        normalized
    }

    fn normalize_array(&self, value: Value) -> Result<Option<Value>, DepthExceeded> {
        let value = self.trim_and_filter(value, 0)?;

        if is_empty_recursive(&value) {
            return Ok(None);
        }

        if let Value::Array(entries) = &value {
            if entries.iter().all(|(_, v)| !v.is_array()) {
                let unique = dedupe_scalars(entries);
                return Ok((!unique.is_empty()).then(|| Value::list(unique)));
            }
        }

        Ok(Some(reindex_numeric(value)))
    }

    /// Trims strings to null and drops null entries along with their keys
    fn trim_and_filter(&self, value: Value, depth: usize) -> Result<Value, DepthExceeded> {
        if depth > self.max_depth {
            return Err(DepthExceeded(self.max_depth));
        }
        match value {
            Value::String(s) => Ok(trim(s).unwrap_or(Value::Null)),
            Value::Array(entries) => {
                let mut kept = Vec::with_capacity(entries.len());
                for (key, entry) in entries {
                    let entry = self.trim_and_filter(entry, depth + 1)?;
                    if !entry.is_null() {
                        kept.push((key, entry));
                    }
                }
                Ok(Value::Array(kept))
            }
            other => Ok(other),
        }
    }
}

fn trim(s: String) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(Value::String(s))
    } else {
        Some(Value::from(trimmed))
    }
}

fn is_empty_recursive(value: &Value) -> bool {
    match value {
        Value::Array(entries) => entries.iter().all(|(_, v)| is_empty_recursive(v)),
        _ => false,
    }
}

/// First occurrence wins; comparison is on the string form so `1` and `"1"` collapse
fn dedupe_scalars(entries: &[(Key, Value)]) -> Vec<Value> {
    let mut seen = std::collections::HashSet::new();
    entries
        .iter()
        .filter(|(_, v)| seen.insert(v.to_display_string()))
        .map(|(_, v)| v.clone())
        .collect()
}

/// Children first, then this level if every key is an integer
fn reindex_numeric(value: Value) -> Value {
    match value {
        Value::Array(entries) => {
            let all_indexes = entries.iter().all(|(k, _)| k.is_index());
            let entries = entries
                .into_iter()
                .map(|(k, v)| (k, reindex_numeric(v)));
            if all_indexes {
                Value::list(entries.map(|(_, v)| v))
            } else {
                Value::Array(entries.collect())
            }
        }
        other => other,
    }
}

fn safe_context_value(value: &Value) -> String {
    match value {
        Value::Array(entries) => format!("[array:{}]", entries.len()),
        other => other.to_display_string(),
    }
}
