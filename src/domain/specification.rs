use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet};

use crate::constants::{DEFAULT_DELIMITER, DEFAULT_MULTI_VALUED_SEPARATOR};
use crate::error::{FeedError, Result};

/// Rename rule for an attribute in child rows: a bare string renames the code only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeMapping {
    Code(String),
    Override {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        label: Option<String>,
    },
}

impl AttributeMapping {
    pub fn code(&self) -> Option<&str> {
        match self {
            AttributeMapping::Code(code) => Some(code),
            AttributeMapping::Override { code, .. } => code.as_deref(),
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            AttributeMapping::Code(_) => None,
            AttributeMapping::Override { label, .. } => label.as_deref(),
        }
    }
}

/// Configuration of one feed run. Built once, borrowed by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSpecification {
    pub format: String,
    pub store_code: String,
    pub delimiter: char,
    pub multi_valued_separator: String,
    pub include_child_prices: bool,
    pub include_out_of_stock: bool,
    pub include_tier_pricing: bool,
    pub include_media_gallery: bool,
    pub include_json_config: bool,
    pub ignore_fields: BTreeSet<String>,
    pub attribute_map: BTreeMap<String, AttributeMapping>,
    pub pre_signed_url: Option<String>,
}

impl Default for FeedSpecification {
    fn default() -> Self {
        Self {
            format: String::new(),
            store_code: "default".to_string(),
            delimiter: DEFAULT_DELIMITER,
            multi_valued_separator: DEFAULT_MULTI_VALUED_SEPARATOR.to_string(),
            include_child_prices: false,
            include_out_of_stock: false,
            include_tier_pricing: false,
            include_media_gallery: false,
            include_json_config: false,
            ignore_fields: BTreeSet::new(),
            attribute_map: BTreeMap::new(),
            pre_signed_url: None,
        }
    }
}

impl FeedSpecification {
    pub fn is_ignored(&self, field: &str) -> bool {
        self.ignore_fields.contains(field)
    }

    pub fn mapping_for(&self, code: &str) -> Option<&AttributeMapping> {
        self.attribute_map.get(code)
    }
}

/// Builds a validated `FeedSpecification` from a request payload
#[derive(Debug, Clone, Default)]
pub struct SpecificationBuilder {
    default_attribute_map: BTreeMap<String, AttributeMapping>,
}

const FLAG_FIELDS: [&str; 5] = [
    "includeChildPrices",
    "includeOutOfStock",
    "includeTierPricing",
    "includeMediaGallery",
    "includeJsonConfig",
];

impl SpecificationBuilder {
    pub fn new(default_attribute_map: BTreeMap<String, AttributeMapping>) -> Self {
        Self {
            default_attribute_map,
        }
    }

    /// Every problem in the payload is reported at once
    pub fn build(&self, payload: &Json) -> Result<FeedSpecification> {
        let object = payload
            .as_object()
            .ok_or_else(|| FeedError::Validation(vec!["payload must be a JSON object".into()]))?;

        let mut errors = Vec::new();
        let mut spec = FeedSpecification {
            attribute_map: self.default_attribute_map.clone(),
            ..FeedSpecification::default()
        };

        match object.get("format") {
            Some(Json::String(format)) if !format.trim().is_empty() => {
                spec.format = format.trim().to_ascii_lowercase();
            }
            Some(Json::String(_)) | None | Some(Json::Null) => {
                errors.push("format field is required".to_string());
            }
            Some(_) => errors.push("format field must be a string".to_string()),
        }

        if let Some(store) = object.get("store") {
            match store.as_str() {
                Some(store) if !store.is_empty() => spec.store_code = store.to_string(),
                _ => errors.push("store field must be a non-empty string".to_string()),
            }
        }

        if let Some(delimiter) = object.get("delimiter") {
            match delimiter.as_str().map(|d| d.chars().collect::<Vec<_>>()) {
                Some(chars) if chars.len() == 1 && chars[0].is_ascii() => spec.delimiter = chars[0],
                _ => errors.push("delimiter field must be a single ASCII character".to_string()),
            }
        }

        if let Some(separator) = object.get("multiValuedSeparator") {
            match separator.as_str() {
                Some(separator) if !separator.is_empty() => {
                    spec.multi_valued_separator = separator.to_string()
                }
                _ => errors.push("multiValuedSeparator field must be a non-empty string".to_string()),
            }
        }

        for field in FLAG_FIELDS {
            let raw = object.get(field).or_else(|| {
                // Older clients spell the acronym in capitals
                (field == "includeJsonConfig")
                    .then(|| object.get("includeJSONConfig"))
                    .flatten()
            });
            let Some(raw) = raw.filter(|v| !v.is_null()) else {
                continue;
            };
            match parse_bool(raw) {
                Some(flag) => match field {
                    "includeChildPrices" => spec.include_child_prices = flag,
                    "includeOutOfStock" => spec.include_out_of_stock = flag,
                    "includeTierPricing" => spec.include_tier_pricing = flag,
                    "includeMediaGallery" => spec.include_media_gallery = flag,
                    _ => spec.include_json_config = flag,
                },
                None => errors.push(format!("\"{}\" field value must be \"0\" or \"1\"", field)),
            }
        }

        match object.get("ignoreFields") {
            None | Some(Json::Null) => {}
            Some(Json::String(list)) => {
                spec.ignore_fields = list
                    .split(',')
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            Some(Json::Array(items)) => {
                for item in items {
                    match item.as_str() {
                        Some(field) if !field.trim().is_empty() => {
                            spec.ignore_fields.insert(field.trim().to_string());
                        }
                        _ => errors.push("ignoreFields entries must be non-empty strings".to_string()),
                    }
                }
            }
            Some(_) => errors.push("ignoreFields must be an array or a comma separated string".to_string()),
        }

        match object.get("attributeMap") {
            None | Some(Json::Null) => {}
            Some(Json::Object(map)) => {
                for (code, rule) in map {
                    match serde_json::from_value::<AttributeMapping>(rule.clone()) {
                        Ok(mapping) => {
                            spec.attribute_map.insert(code.clone(), mapping);
                        }
                        Err(_) => errors.push(format!(
                            "attributeMap.{} must be a string or an object with code/label",
                            code
                        )),
                    }
                }
            }
            Some(_) => errors.push("attributeMap must be an object".to_string()),
        }

        match object.get("preSignedUrl") {
            None | Some(Json::Null) => {}
            Some(Json::String(url)) => match reqwest::Url::parse(url) {
                Ok(_) => spec.pre_signed_url = Some(url.clone()),
                Err(e) => errors.push(format!("preSignedUrl is not a valid URL: {}", e)),
            },
            Some(_) => errors.push("preSignedUrl must be a string".to_string()),
        }

        if errors.is_empty() {
            Ok(spec)
        } else {
            Err(FeedError::Validation(errors))
        }
    }
}

/// Accepts `true`, `false`, `0`, `1`, `"0"` and `"1"`
fn parse_bool(value: &Json) -> Option<bool> {
    match value {
        Json::Bool(flag) => Some(*flag),
        Json::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Json::String(s) if s == "0" => Some(false),
        Json::String(s) if s == "1" => Some(true),
        _ => None,
    }
}
