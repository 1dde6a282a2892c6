use std::sync::{Arc, RwLock};

use crate::index::OntologyIndex;

/// An immutable, versioned view of the ontology index.
#[derive(Debug)]
pub struct IndexSnapshot {
    pub version: u64,
    pub index: OntologyIndex,
}

/// Shared pointer to the current snapshot.
///
/// Readers take an `Arc` and keep using it for as long as they need; a
/// rebuild installs a new snapshot without touching the old one.
#[derive(Debug, Clone)]
pub struct IndexHandle {
    current: Arc<RwLock<Arc<IndexSnapshot>>>,
}

impl IndexHandle {
    pub fn new(index: OntologyIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(IndexSnapshot { version: 1, index }))),
        }
    }

    pub fn snapshot(&self) -> Arc<IndexSnapshot> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Publish `index` as the next version and return that version.
    pub fn swap(&self, index: OntologyIndex) -> u64 {
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let version = guard.version + 1;
        *guard = Arc::new(IndexSnapshot { version, index });

        tracing::info!(version, "Published new ontology index snapshot");
        version
    }
}
