use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::{
    COMPRESSION_CHUNK_SIZE, DEFAULT_FEED_TYPE, DEFAULT_PAGE_SIZE, DEFAULT_STORAGE_TYPE,
    MSI_REQUIRED_MODULES,
};
use crate::domain::specification::AttributeMapping;
use crate::error::{FeedError, Result};

pub const ENV_DEBUG: &str = "CATALOG_FEED_DEBUG";
pub const ENV_WORK_DIR: &str = "CATALOG_FEED_WORK_DIR";
pub const ENV_PAGE_SIZE: &str = "CATALOG_FEED_PAGE_SIZE";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSettings,
    pub collection: CollectionConfig,
    pub storage: StorageConfig,
    pub inventory: InventoryConfig,
    pub children: ChildrenConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub debug: bool,
    /// Only consulted in debug mode: keep local feed files when false
    pub delete_file: bool,
    pub work_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            debug: false,
            delete_file: true,
            work_dir: std::env::temp_dir().join("catalog-feed"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    pub page_size: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub feed_type: String,
    pub storage_type: String,
    pub compression_chunk_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            feed_type: DEFAULT_FEED_TYPE.to_string(),
            storage_type: DEFAULT_STORAGE_TYPE.to_string(),
            compression_chunk_size: COMPRESSION_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub installed_modules: Vec<String>,
    pub extra_msi_modules: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChildrenConfig {
    pub exclude_disabled: bool,
    pub dispatch_build_events: bool,
    /// Default code/label remapping, overridden per key by the request payload
    pub attribute_map: BTreeMap<String, AttributeMapping>,
}

impl Default for ChildrenConfig {
    fn default() -> Self {
        Self {
            exclude_disabled: true,
            dispatch_build_events: true,
            attribute_map: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from an optional TOML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            FeedError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: AppConfig = toml::from_str(&content)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Applies `CATALOG_FEED_*` overrides read through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DEBUG) {
            self.app.debug = parse_flag(&raw).ok_or_else(|| {
                FeedError::Config(format!("{} must be a boolean, got '{}'", ENV_DEBUG, raw))
            })?;
        }
        if let Some(dir) = lookup(ENV_WORK_DIR) {
            self.app.work_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            self.collection.page_size = raw.trim().parse().map_err(|_| {
                FeedError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    ENV_PAGE_SIZE, raw
                ))
            })?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.collection.page_size == 0 {
            return Err(FeedError::Config("collection.page_size must be greater than 0".into()));
        }
        if self.storage.compression_chunk_size == 0 {
            return Err(FeedError::Config(
                "storage.compression_chunk_size must be greater than 0".into(),
            ));
        }
        if self.storage.feed_type.trim().is_empty() {
            warn!("storage.feed_type is empty; file names will omit it");
        }
        Ok(())
    }

    /// Local files are removed after commit unless debug mode keeps them
    pub fn delete_file_after_commit(&self) -> bool {
        !self.app.debug || self.app.delete_file
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::detect(&self.inventory)
    }
}

/// Optional platform features the pipeline adapts to, resolved once per process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    /// Multi-source inventory: salable quantity comes from source items and reservations
    pub msi: bool,
}

impl Capabilities {
    pub fn detect(inventory: &InventoryConfig) -> Self {
        let installed = |module: &str| inventory.installed_modules.iter().any(|m| m == module);
        let msi = MSI_REQUIRED_MODULES
            .iter()
            .copied()
            .chain(inventory.extra_msi_modules.iter().map(String::as_str))
            .all(installed);
        Self { msi }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
