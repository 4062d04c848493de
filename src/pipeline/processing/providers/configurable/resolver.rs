use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::app::ports::ChildCatalog;
use crate::constants::CHILD_DEFAULT_ATTRIBUTES;
use crate::domain::attribute::Attribute;
use crate::domain::product::Product;
use crate::error::Result;
use crate::observability::metrics;

/// Page-scoped cache of configurable children and attributes, keyed by parent link id.
///
/// Shared by every provider that needs variants so one page costs one child
/// query and one attribute query.
pub struct ConfigurableResolver {
    catalog: Arc<dyn ChildCatalog>,
    children: Mutex<HashMap<i64, Vec<Arc<Product>>>>,
    attributes: Mutex<HashMap<i64, Vec<Arc<Attribute>>>>,
}

impl std::fmt::Debug for ConfigurableResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurableResolver")
            .field("cached_parents", &lock(&self.children).len())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConfigurableResolver {
    pub fn new(catalog: Arc<dyn ChildCatalog>) -> Self {
        Self {
            catalog,
            children: Mutex::new(HashMap::new()),
            attributes: Mutex::new(HashMap::new()),
        }
    }

    /// Loads children and attributes for parents not cached yet
    pub fn load(&self, parents: &[Arc<Product>]) -> Result<()> {
        let mut seen = HashSet::new();
        let mut duplicates = Vec::new();
        let mut parent_ids = Vec::new();
        for parent in parents {
            let link_id = parent.link_id();
            if seen.insert(link_id) {
                parent_ids.push(link_id);
            } else {
                duplicates.push(link_id);
            }
        }
        if !duplicates.is_empty() {
            warn!(
                parent_ids = ?parent_ids,
                duplicate_parent_ids = ?duplicates,
                "Duplicate parent IDs found, keeping only unique IDs for the child collection"
            );
            metrics::provider::duplicate_parents(duplicates.len() as u64);
        }

        let missing: Vec<i64> = {
            let cached = lock(&self.children);
            parent_ids.into_iter().filter(|id| !cached.contains_key(id)).collect()
        };
        if missing.is_empty() {
            return Ok(());
        }

        let attributes = self.catalog.configurable_attributes(&missing)?;
        let mut codes: BTreeSet<String> = attributes
            .values()
            .flatten()
            .map(|attribute| attribute.code.clone())
            .collect();
        codes.extend(CHILD_DEFAULT_ATTRIBUTES.iter().map(|code| code.to_string()));

        let children = self.catalog.children(&missing, &codes)?;
        debug!(
            parents = missing.len(),
            children = children.values().map(Vec::len).sum::<usize>(),
            attribute_codes = ?codes,
            "Loaded configurable children"
        );

        let mut cached_children = lock(&self.children);
        let mut cached_attributes = lock(&self.attributes);
        for id in missing {
            let kids = children.get(&id).cloned().unwrap_or_default();
            cached_children.insert(id, kids.into_iter().map(Arc::new).collect());
            cached_attributes.insert(id, attributes.get(&id).cloned().unwrap_or_default());
        }
        Ok(())
    }

    pub fn children(&self, parent: &Product) -> Vec<Arc<Product>> {
        lock(&self.children).get(&parent.link_id()).cloned().unwrap_or_default()
    }

    pub fn attributes(&self, parent: &Product) -> Vec<Arc<Attribute>> {
        lock(&self.attributes).get(&parent.link_id()).cloned().unwrap_or_default()
    }

    pub fn reset(&self) {
        lock(&self.children).clear();
        lock(&self.attributes).clear();
    }
}
