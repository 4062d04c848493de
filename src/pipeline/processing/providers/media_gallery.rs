use crate::constants::MEDIA_GALLERY_FIELD;
use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::domain::value::Value;
use crate::error::Result;
use crate::pipeline::processing::providers::DataProvider;

/// Enabled gallery images ordered by position.
///
/// Relies on the gallery having been attached to the loaded products by the
/// media gallery collection processor.
#[derive(Debug, Default)]
pub struct MediaGalleryProvider;

impl DataProvider for MediaGalleryProvider {
    fn name(&self) -> &'static str {
        "media_gallery"
    }

    fn get_data(&mut self, rows: &mut [ProductRow], spec: &FeedSpecification) -> Result<()> {
        if !spec.include_media_gallery || spec.is_ignored(MEDIA_GALLERY_FIELD) {
            return Ok(());
        }

        for row in rows.iter_mut() {
            let Some(product) = row.model() else {
                continue;
            };
            let Some(gallery) = &product.media_gallery else {
                continue;
            };

            let mut images: Vec<_> = gallery
                .iter()
                .filter(|entry| !entry.disabled && entry.media_type == "image")
                .collect();
            images.sort_by_key(|entry| entry.position);

            let images = images.into_iter().map(|entry| {
                Value::map([
                    ("image", Value::from(entry.file.as_str())),
                    ("label", Value::from(entry.label.clone())),
                    ("position", Value::Int(entry.position)),
                ])
            });
            row.set(MEDIA_GALLERY_FIELD, Value::list(images));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::product::Product;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_enabled_images_in_position_order() {
        let product: Arc<Product> = Arc::new(
            serde_json::from_value(json!({
                "id": 1, "sku": "A",
                "media_gallery": [
                    {"file": "/b.jpg", "position": 2},
                    {"file": "/a.jpg", "label": "Front", "position": 1},
                    {"file": "/hidden.jpg", "position": 0, "disabled": true},
                    {"file": "/clip.mp4", "position": 3, "media_type": "external-video"}
                ]
            }))
            .unwrap(),
        );
        let mut rows = vec![ProductRow::from_product(&product)];
        let spec = FeedSpecification { include_media_gallery: true, ..FeedSpecification::default() };

        MediaGalleryProvider.get_data(&mut rows, &spec).unwrap();

        assert_eq!(
            rows[0].get(MEDIA_GALLERY_FIELD).unwrap().to_json(),
            json!([
                {"image": "/a.jpg", "label": "Front", "position": 1},
                {"image": "/b.jpg", "label": null, "position": 2}
            ])
        );
    }

    #[test]
    fn test_disabled_by_default() {
        let product: Arc<Product> = Arc::new(
            serde_json::from_value(json!({"id": 1, "sku": "A", "media_gallery": [{"file": "/a.jpg"}]})).unwrap(),
        );
        let mut rows = vec![ProductRow::from_product(&product)];
        MediaGalleryProvider.get_data(&mut rows, &FeedSpecification::default()).unwrap();
        assert!(rows[0].get(MEDIA_GALLERY_FIELD).is_none());
    }
}
