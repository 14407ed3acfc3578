//! Persisted chunk embeddings with nearest-neighbour lookup

use chrono::{DateTime, Utc};
use seopilot_provider::Embedder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::chunk::chunk_text;
use crate::store::read_dir_items;
use crate::{truncate_chars, KnowledgeError, KnowledgeHit, Result};

const EPSILON: f32 = 1e-10;

/// `dot(a, b) / (|a| * |b| + eps)`; vectors of different length score 0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + EPSILON)
}

/// One embedded chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub file: String,
    pub chunk_index: usize,
    pub text: String,
    pub vector: Vec<f32>,
}

/// On-disk index layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub model: String,
    pub items: Vec<VectorRecord>,
    pub updated_at: DateTime<Utc>,
}

impl IndexFile {
    fn empty(model: &str) -> Self {
        Self {
            model: model.to_string(),
            items: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

/// Embedding index, rebuilt in full and swapped atomically
pub struct VectorIndex {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
    snippet_chars: usize,
    snapshot: RwLock<Arc<IndexFile>>,
}

impl VectorIndex {
    pub fn new(
        path: impl Into<PathBuf>,
        embedder: Arc<dyn Embedder>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        let model = embedder.model().to_string();
        Self {
            path: path.into(),
            embedder,
            chunk_size,
            chunk_overlap,
            snippet_chars: 300,
            snapshot: RwLock::new(Arc::new(IndexFile::empty(&model))),
        }
    }

    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> Arc<IndexFile> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    fn swap(&self, index: IndexFile) {
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(index);
    }

    pub fn len(&self) -> usize {
        self.snapshot().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the persisted index; a missing file leaves the index empty
    pub async fn load(&self) -> Result<usize> {
        if !self.path.exists() {
            debug!("No vector index at {}", self.path.display());
            return Ok(0);
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        let index: IndexFile = serde_json::from_str(&content)?;
        if index.model != self.embedder.model() {
            warn!(
                "Vector index was built with {} but embedder is {}",
                index.model,
                self.embedder.model()
            );
        }
        let count = index.items.len();
        self.swap(index);
        Ok(count)
    }

    /// Chunk and embed every file in `dir`, replacing the whole index.
    ///
    /// The file is written to a sibling temp path and renamed over the old
    /// one, so concurrent readers of the file see either version.
    pub async fn rebuild(&self, dir: &Path) -> Result<usize> {
        let mut records = Vec::new();
        for item in read_dir_items(dir).await? {
            for (chunk_index, text) in chunk_text(&item.content, self.chunk_size, self.chunk_overlap)
                .into_iter()
                .enumerate()
            {
                records.push(VectorRecord {
                    file: item.title.clone(),
                    chunk_index,
                    text,
                    vector: Vec::new(),
                });
            }
        }

        if !records.is_empty() {
            let texts: Vec<String> = records.iter().map(|r| r.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(KnowledgeError::VectorCount {
                    expected: texts.len(),
                    got: vectors.len(),
                });
            }
            for (record, vector) in records.iter_mut().zip(vectors) {
                record.vector = vector;
            }
        }

        let index = IndexFile {
            model: self.embedder.model().to_string(),
            items: records,
            updated_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec(&index)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        let count = index.items.len();
        self.swap(index);
        info!("Rebuilt vector index with {} chunks", count);
        Ok(count)
    }

    /// Top `k` chunks for `text`, score mapped from cosine into `[0, 1]`
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<KnowledgeHit>> {
        let snapshot = self.snapshot();
        if snapshot.items.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or(KnowledgeError::VectorCount { expected: 1, got: 0 })?;

        let mut scored: Vec<(f32, &VectorRecord)> = snapshot
            .items
            .iter()
            .map(|r| ((cosine_similarity(&query, &r.vector) + 1.0) / 2.0, r))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(score, r)| KnowledgeHit {
                title: r.file.clone(),
                snippet: truncate_chars(&r.text, self.snippet_chars),
                score,
                chunk_index: Some(r.chunk_index),
            })
            .collect())
    }
}
