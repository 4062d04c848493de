// Domain data shapes shared across layers

pub mod attribute;
pub mod product;
pub mod specification;
pub mod value;

pub use attribute::{Attribute, AttributeSource, OptionText, Phrase};
pub use product::{FeedRecord, Product, ProductRow, ProductType};
pub use specification::{AttributeMapping, FeedSpecification, SpecificationBuilder};
pub use value::{Key, Value};
