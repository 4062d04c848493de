use chrono::Utc;
use uuid::Uuid;

/// Unique feed file names: `<feed_type>_<storage_type>_<timestamp>_<uuid>`
#[derive(Debug, Clone)]
pub struct NameGenerator {
    parts: Vec<String>,
}

impl NameGenerator {
    pub fn new(feed_type: &str, storage_type: &str) -> Self {
        Self {
            parts: vec![feed_type.to_string(), storage_type.to_string()],
        }
    }

    pub fn generate(&self) -> String {
        let mut parts: Vec<String> = self.parts.iter().filter(|p| !p.is_empty()).cloned().collect();
        parts.push(Utc::now().format("%Y%m%d%H%M%S").to_string());
        parts.push(Uuid::new_v4().simple().to_string());
        parts.join("_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_name_layout() {
        let name = NameGenerator::new("product", "aws_presigned").generate();
        let pattern = Regex::new(r"^product_aws_presigned_\d{14}_[0-9a-f]{32}$").unwrap();
        assert!(pattern.is_match(&name), "{name}");
    }

    #[test]
    fn test_names_are_unique() {
        let generator = NameGenerator::new("product", "local");
        assert_ne!(generator.generate(), generator.generate());
    }
}
