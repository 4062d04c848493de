use std::sync::Arc;

use crate::app::ports::AttributeRepository;
use crate::constants::is_system_field;
use crate::domain::attribute::Attribute;
use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::pipeline::processing::normalize::ValueNormalizer;
use crate::pipeline::processing::providers::DataProvider;
use crate::pipeline::processing::value_processor::ValueProcessor;

/// Copies every exported attribute the product has a value for
pub struct AttributesProvider {
    repository: Arc<dyn AttributeRepository>,
    value_processor: ValueProcessor,
    normalizer: ValueNormalizer,
    attributes: Option<Vec<Arc<Attribute>>>,
}

impl AttributesProvider {
    pub fn new(repository: Arc<dyn AttributeRepository>) -> Self {
        Self {
            repository,
            value_processor: ValueProcessor::new(),
            normalizer: ValueNormalizer::new(),
            attributes: None,
        }
    }

    /// Exported attributes for this run, loaded on first use
    fn attributes(&mut self, spec: &FeedSpecification) -> Result<Vec<Arc<Attribute>>> {
        if self.attributes.is_none() {
            let selected = self
                .repository
                .feed_attributes()?
                .into_iter()
                .filter(|a| !spec.is_ignored(&a.code) && !is_system_field(&a.code))
                .collect();
            self.attributes = Some(selected);
        }
        Ok(self.attributes.clone().unwrap_or_default())
    }
}

impl DataProvider for AttributesProvider {
    fn name(&self) -> &'static str {
        "attributes"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        let attributes = self.attributes(spec)?;

        for row in rows.iter_mut() {
            let Some(product) = row.model() else {
                continue;
            };
            for attribute in &attributes {
                let Some(raw) = product.data.get(&attribute.code) else {
                    continue;
                };
                let value = self.value_processor.get_value(attribute, raw, &product)?;
                if let Some(value) = self.normalizer.normalize(value, &attribute.code) {
                    row.set(attribute.code.as_str(), value);
                }
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.attributes = None;
        self.value_processor.reset();
    }

    fn reset_after_fetch_items(&mut self) {
        self.value_processor.reset();
    }
}
