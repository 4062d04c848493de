// Feed storage: formatting, file writing, compression and upload

pub mod compress;
pub mod file;
pub mod formatter;
pub mod name;
pub mod presigned;

pub use file::{CsvFile, FeedFile, FileFactory, JsonFile};
pub use formatter::{CsvFormatter, Formatter, FormatterPool, JsonFormatter};
pub use name::NameGenerator;
pub use presigned::PreSignedUrlStorage;

use serde::Serialize;
use std::fmt;

use crate::domain::product::ProductRow;
use crate::domain::specification::FeedSpecification;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageState {
    Uninitialized,
    Initiated,
    Writing,
    Committed,
    RolledBack,
}

impl StorageState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StorageState::Committed | StorageState::RolledBack)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageState::Uninitialized => "uninitialized",
            StorageState::Initiated => "initiated",
            StorageState::Writing => "writing",
            StorageState::Committed => "committed",
            StorageState::RolledBack => "rolled back",
        }
    }
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What was handed to the sink on commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// Name of the feed file as written
    pub name: String,
    /// Name of the artifact uploaded, with `.gz` when compressed
    pub uploaded_name: String,
    pub size: u64,
    pub sha256: String,
    pub compressed: bool,
}

/// Destination of one feed run.
///
/// `initiate` opens a run; `add_data` may follow any number of times; exactly
/// one of `commit` or `rollback` closes it.
pub trait Storage {
    fn initiate(&mut self, spec: &FeedSpecification) -> Result<()>;

    fn add_data(&mut self, rows: Vec<ProductRow>) -> Result<()>;

    fn commit(&mut self, delete_file_after: bool) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    fn state(&self) -> StorageState;

    /// File details of the last commit
    fn additional_data(&self) -> Option<&FileInfo>;
}
