// Feed pipeline: collection paging, row processing, and storage

pub mod collection;
pub mod processing;
pub mod storage;
