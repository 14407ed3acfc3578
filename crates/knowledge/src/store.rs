//! In-memory keyword store

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::{truncate_chars, KnowledgeHit, Result};

/// File extensions loaded from the knowledge directory
pub const KNOWLEDGE_EXTENSIONS: &[&str] = &["md", "txt", "json", "csv"];

/// A loaded reference document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

impl KnowledgeItem {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            vector: None,
        }
    }
}

/// Read-mostly keyword store.
///
/// Readers take an `Arc` snapshot of the whole item set; writers build a new
/// set and swap it in, so a query never sees a half-applied reload.
pub struct KnowledgeStore {
    items: RwLock<Arc<Vec<KnowledgeItem>>>,
    max_content_chars: usize,
    snippet_chars: usize,
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new(4000, 300)
    }
}

impl KnowledgeStore {
    pub fn new(max_content_chars: usize, snippet_chars: usize) -> Self {
        Self {
            items: RwLock::new(Arc::new(Vec::new())),
            max_content_chars,
            snippet_chars,
        }
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, Arc<Vec<KnowledgeItem>>> {
        self.items.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, Arc<Vec<KnowledgeItem>>> {
        self.items.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Current item set
    pub fn snapshot(&self) -> Arc<Vec<KnowledgeItem>> {
        Arc::clone(&self.read_lock())
    }

    /// Replace every item at once
    pub fn replace(&self, items: Vec<KnowledgeItem>) {
        let items: Vec<KnowledgeItem> = items
            .into_iter()
            .map(|mut item| {
                item.content = truncate_chars(&item.content, self.max_content_chars);
                item
            })
            .collect();
        *self.write_lock() = Arc::new(items);
    }

    /// Add items without touching existing ones
    pub fn append(&self, new_items: Vec<KnowledgeItem>) {
        if new_items.is_empty() {
            return;
        }
        let mut guard = self.write_lock();
        let mut items: Vec<KnowledgeItem> = guard.as_ref().clone();
        items.extend(new_items.into_iter().map(|mut item| {
            item.content = truncate_chars(&item.content, self.max_content_chars);
            item
        }));
        *guard = Arc::new(items);
    }

    /// Load every supported file in `dir`, replacing the current set.
    ///
    /// A missing directory yields an empty store.
    pub async fn load_dir(&self, dir: &Path) -> Result<usize> {
        let items = read_dir_items(dir).await?;
        let count = items.len();
        self.replace(items);
        info!("Loaded {} knowledge items from {}", count, dir.display());
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn titles(&self) -> Vec<String> {
        self.snapshot().iter().map(|i| i.title.clone()).collect()
    }

    /// Keyword search.
    ///
    /// Score is 2 for a case-insensitive content match plus 1 for a title
    /// match. Ties keep load order.
    pub fn search(&self, query: &str, limit: usize) -> Vec<KnowledgeHit> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        let normalized_needle = normalize_title(&needle);

        let snapshot = self.snapshot();
        let mut scored: Vec<(u32, &KnowledgeItem)> = snapshot
            .iter()
            .filter_map(|item| {
                let mut score = 0;
                if item.content.to_lowercase().contains(&needle) {
                    score += 2;
                }
                let title = item.title.to_lowercase();
                if title.contains(&needle)
                    || normalize_title(&title).contains(&normalized_needle)
                {
                    score += 1;
                }
                (score > 0).then_some((score, item))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(limit);

        debug!("Keyword search '{}' matched {} items", query, scored.len());

        scored
            .into_iter()
            .map(|(score, item)| KnowledgeHit {
                title: item.title.clone(),
                snippet: truncate_chars(&item.content, self.snippet_chars),
                score: score as f32,
                chunk_index: None,
            })
            .collect()
    }
}

/// Lower-cased text with file-name separators read as spaces
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '-' | '_' | '.') { ' ' } else { c })
        .collect()
}

/// Whether `path` has a loadable extension
pub fn is_knowledge_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| KNOWLEDGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Read supported files from `dir`, sorted by file name
pub async fn read_dir_items(dir: &Path) -> Result<Vec<KnowledgeItem>> {
    if !dir.exists() {
        warn!("Knowledge directory {} does not exist", dir.display());
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() && is_knowledge_file(&path) {
            paths.push(path);
        }
    }
    paths.sort();

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        let title = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => items.push(KnowledgeItem::new(title, content)),
            Err(e) => warn!("Skipping unreadable knowledge file {}: {}", path.display(), e),
        }
    }

    Ok(items)
}
