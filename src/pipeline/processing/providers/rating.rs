use std::sync::Arc;

use crate::app::ports::RatingSource;
use crate::constants::{RATING_COUNT_FIELD, RATING_FIELD, RATING_SCALE_DIVISOR};
use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::error::Result;
use crate::pipeline::processing::providers::DataProvider;

/// Star rating (0-5) and review count, one summary query per page
pub struct RatingProvider {
    source: Arc<dyn RatingSource>,
}

impl RatingProvider {
    pub fn new(source: Arc<dyn RatingSource>) -> Self {
        Self { source }
    }
}

impl DataProvider for RatingProvider {
    fn name(&self) -> &'static str {
        "rating"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        let with_rating = !spec.is_ignored(RATING_FIELD);
        let with_count = !spec.is_ignored(RATING_COUNT_FIELD);
        if !with_rating && !with_count {
            return Ok(());
        }

        let ids: Vec<i64> = rows.iter().filter_map(ProductRow::entity_id).collect();
        if ids.is_empty() {
            return Ok(());
        }
        let summaries = self.source.summaries(&ids, &spec.store_code)?;

        for row in rows.iter_mut() {
            let Some(summary) = row.entity_id().and_then(|id| summaries.get(&id)) else {
                continue;
            };
            if with_rating {
                row.set(RATING_FIELD, summary.rating_summary / RATING_SCALE_DIVISOR);
            }
            if with_count {
                row.set(RATING_COUNT_FIELD, summary.reviews_count as i64);
            }
        }
        Ok(())
    }
}
