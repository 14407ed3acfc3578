//! Retrieval facade choosing vector or keyword search

use std::sync::Arc;
use tracing::{debug, warn};

use crate::store::KnowledgeStore;
use crate::vector::VectorIndex;
use crate::KnowledgeHit;

pub struct KnowledgeBase {
    store: Arc<KnowledgeStore>,
    index: Option<Arc<VectorIndex>>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store, index: None }
    }

    pub fn with_index(mut self, index: Arc<VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    pub fn index(&self) -> Option<&Arc<VectorIndex>> {
        self.index.as_ref()
    }

    /// Vector search when an index holds chunks, keyword search otherwise.
    /// An embedding failure falls back to keyword search.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<KnowledgeHit> {
        if let Some(index) = self.index.as_ref().filter(|i| !i.is_empty()) {
            match index.query(query, limit).await {
                Ok(hits) => {
                    debug!("Vector search returned {} hits", hits.len());
                    return hits;
                }
                Err(e) => warn!("Vector search failed, using keyword search: {}", e),
            }
        }
        self.store.search(query, limit)
    }
}
