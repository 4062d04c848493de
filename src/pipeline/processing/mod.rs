// Row processing: value cleanup, option resolution, and data providers

pub mod normalize;
pub mod providers;
pub mod value_processor;

pub use normalize::ValueNormalizer;
pub use value_processor::ValueProcessor;
