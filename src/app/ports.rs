use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::attribute::Attribute;
use crate::domain::product::{MediaEntry, Product};
use crate::domain::specification::FeedSpecification;
use crate::error::Result;

/// Filters accumulated by collection modifiers before a page is loaded
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionQuery {
    pub store_code: String,
    /// `None` loads every attribute
    pub attributes: Option<BTreeSet<String>>,
    /// `None` loads every visibility
    pub visibility: Option<Vec<i64>>,
}

impl CollectionQuery {
    pub fn new(store_code: impl Into<String>) -> Self {
        Self {
            store_code: store_code.into(),
            ..Self::default()
        }
    }

    pub fn select_attributes<I, S>(&mut self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .get_or_insert_with(BTreeSet::new)
            .extend(codes.into_iter().map(Into::into));
    }
}

/// Paginated product source; pages are 1-based
pub trait CatalogSource: Send + Sync {
    fn load_page(&self, query: &CollectionQuery, page: usize, page_size: usize) -> Result<Vec<Product>>;
}

pub trait AttributeRepository: Send + Sync {
    /// Attributes exported in the feed
    fn feed_attributes(&self) -> Result<Vec<Arc<Attribute>>>;
}

/// Configurable product relations, queried in bulk by parent link id
pub trait ChildCatalog: Send + Sync {
    /// Children of each parent, loaded with at least the given attribute codes
    fn children(&self, parent_link_ids: &[i64], attribute_codes: &BTreeSet<String>) -> Result<BTreeMap<i64, Vec<Product>>>;

    /// Attributes each parent is configured by
    fn configurable_attributes(&self, parent_link_ids: &[i64]) -> Result<BTreeMap<i64, Vec<Arc<Attribute>>>>;
}

pub trait MediaGallerySource: Send + Sync {
    fn gallery(&self, product_ids: &[i64]) -> Result<BTreeMap<i64, Vec<MediaEntry>>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RatingSummary {
    /// Average rating as a 0-100 percentage
    pub rating_summary: f64,
    pub reviews_count: u64,
}

pub trait RatingSource: Send + Sync {
    fn summaries(&self, product_ids: &[i64], store_code: &str) -> Result<BTreeMap<i64, RatingSummary>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Stream,
}

impl UploadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadKind::Stream => "stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadRequest {
    pub kind: UploadKind,
    pub file: PathBuf,
}

impl UploadRequest {
    pub fn stream(file: PathBuf) -> Self {
        Self {
            kind: UploadKind::Stream,
            file,
        }
    }
}

/// Destination of a committed feed file
pub trait UploadSink: Send + Sync {
    fn save(&self, spec: &FeedSpecification, request: &UploadRequest) -> Result<()>;
}

/// Every read port a feed run needs
#[derive(Clone)]
pub struct CatalogPorts {
    pub products: Arc<dyn CatalogSource>,
    pub attributes: Arc<dyn AttributeRepository>,
    pub children: Arc<dyn ChildCatalog>,
    pub media: Arc<dyn MediaGallerySource>,
    pub ratings: Arc<dyn RatingSource>,
}

impl CatalogPorts {
    /// All ports served by one adapter
    pub fn from_single<T>(catalog: Arc<T>) -> Self
    where
        T: CatalogSource + AttributeRepository + ChildCatalog + MediaGallerySource + RatingSource + 'static,
    {
        Self {
            products: catalog.clone(),
            attributes: catalog.clone(),
            children: catalog.clone(),
            media: catalog.clone(),
            ratings: catalog,
        }
    }
}
