//! Field codes and keys shared across the feed pipeline.
//! Keeping them here avoids drift between providers that read and write the same fields.

// Row fields written when a product is converted into a feed row
pub const ENTITY_ID_FIELD: &str = "entity_id";
pub const SKU_FIELD: &str = "sku";
pub const TYPE_ID_FIELD: &str = "type_id";

/// Internal back-reference to the product model; never serialized
pub const PRODUCT_MODEL_FIELD: &str = "product_model";

// Configurable children
pub const CHILD_INFO_FIELD: &str = "child_info";
pub const CHILD_SKU_FIELD: &str = "child_sku";
pub const CHILD_NAME_FIELD: &str = "child_name";
pub const CHILD_FINAL_PRICE_FIELD: &str = "child_final_price";
pub const CHILD_MINIMAL_PRICE_FIELD: &str = "child_minimal_price";
pub const CHILD_MAXIMAL_PRICE_FIELD: &str = "child_maximal_price";
pub const JSON_CONFIG_FIELD: &str = "json_config";
pub const SWATCH_JSON_CONFIG_FIELD: &str = "swatch_json_config";

// Price fields
pub const PRICE_CODE: &str = "price";
pub const SPECIAL_PRICE_CODE: &str = "special_price";
pub const SPECIAL_FROM_DATE_CODE: &str = "special_from_date";
pub const SPECIAL_TO_DATE_CODE: &str = "special_to_date";
pub const COST_CODE: &str = "cost";
pub const FINAL_PRICE_CODE: &str = "final_price";
pub const MINIMAL_PRICE_CODE: &str = "minimal_price";
pub const MAXIMAL_PRICE_CODE: &str = "maximal_price";
pub const TIER_PRICE_CODE: &str = "tier_price";
pub const REGULAR_PRICE_FIELD: &str = "regular_price";
pub const MAX_PRICE_FIELD: &str = "max_price";

/// Codes treated as prices when building child rows
pub const PRICE_LIKE_CODES: [&str; 6] = [
    PRICE_CODE,
    SPECIAL_PRICE_CODE,
    COST_CODE,
    FINAL_PRICE_CODE,
    MINIMAL_PRICE_CODE,
    MAXIMAL_PRICE_CODE,
];

// Stock, rating and media fields
pub const IN_STOCK_FIELD: &str = "in_stock";
pub const STOCK_QTY_FIELD: &str = "stock_qty";
pub const RATING_FIELD: &str = "rating";
pub const RATING_COUNT_FIELD: &str = "rating_count";
pub const MEDIA_GALLERY_FIELD: &str = "media_gallery";
pub const NAME_CODE: &str = "name";
pub const STATUS_CODE: &str = "status";

/// Collection flag set once gallery entries are attached to loaded items
pub const MEDIA_GALLERY_ADDED_FLAG: &str = "media_gallery_added";

/// Fields owned by dedicated providers; the attributes provider leaves them alone
pub const SYSTEM_FIELDS: [&str; 8] = [
    PRODUCT_MODEL_FIELD,
    ENTITY_ID_FIELD,
    SKU_FIELD,
    TYPE_ID_FIELD,
    CHILD_INFO_FIELD,
    MEDIA_GALLERY_FIELD,
    JSON_CONFIG_FIELD,
    SWATCH_JSON_CONFIG_FIELD,
];

/// Attributes always selected for configurable children
pub const CHILD_DEFAULT_ATTRIBUTES: [&str; 6] = [
    STATUS_CODE,
    SKU_FIELD,
    NAME_CODE,
    SPECIAL_PRICE_CODE,
    SPECIAL_TO_DATE_CODE,
    SPECIAL_FROM_DATE_CODE,
];

/// Modules that must all be installed for multi-source inventory to be used
pub const MSI_REQUIRED_MODULES: [&str; 3] = [
    "Magento_InventoryReservationsApi",
    "Magento_InventorySalesApi",
    "Magento_InventoryCatalogApi",
];

// Storage
pub const FORMAT_JSON: &str = "json";
pub const FORMAT_CSV: &str = "csv";
pub const GZIP_EXTENSION: &str = "gz";
pub const DEFAULT_FEED_TYPE: &str = "product";
pub const DEFAULT_STORAGE_TYPE: &str = "aws_presigned";

/// Compression reads and writes in chunks of this size
pub const COMPRESSION_CHUNK_SIZE: usize = 512 * 1024;

pub const DEFAULT_PAGE_SIZE: usize = 500;
pub const DEFAULT_MULTI_VALUED_SEPARATOR: &str = "|";
pub const DEFAULT_DELIMITER: char = ',';

/// Rating summaries are stored as a 0-100 percentage; feeds expose 0-5 stars
pub const RATING_SCALE_DIVISOR: f64 = 20.0;

/// Returns true for codes that hold prices
pub fn is_price_like(code: &str) -> bool {
    PRICE_LIKE_CODES.contains(&code)
}

/// Returns true for fields the attributes provider must not overwrite
pub fn is_system_field(code: &str) -> bool {
    SYSTEM_FIELDS.contains(&code)
}
