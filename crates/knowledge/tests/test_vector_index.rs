//! Vector index rebuild, persistence and facade fallback

use async_trait::async_trait;
use seopilot_knowledge::{
    KnowledgeBase, KnowledgeItem, KnowledgeStore, VectorIndex,
};
use seopilot_provider::{Embedder, ProviderError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

/// Embeds text as counts of a few marker words
struct MarkerEmbedder {
    calls: AtomicUsize,
}

const MARKERS: &[&str] = &["citations", "reviews", "schema", "speed"];

impl MarkerEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Embedder for MarkerEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                MARKERS
                    .iter()
                    .map(|m| lower.matches(m).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }

    fn model(&self) -> &str {
        "marker-test"
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Err(ProviderError::Api {
            status: 500,
            message: "down".to_string(),
        })
    }

    fn model(&self) -> &str {
        "failing"
    }
}

async fn knowledge_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("citations.md"), "Citations citations and NAP")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("reviews.txt"), "Ask customers for reviews")
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("ignored.pdf"), "citations").await.unwrap();
    dir
}

#[tokio::test]
async fn test_rebuild_persists_and_ranks() {
    let dir = knowledge_dir().await;
    let index_path = dir.path().join("index").join("vectors.json");
    let index = VectorIndex::new(&index_path, Arc::new(MarkerEmbedder::new()), 800, 100);

    let count = index.rebuild(dir.path()).await.unwrap();
    assert_eq!(count, 2);
    assert!(index_path.exists());
    assert!(!index_path.with_extension("json.tmp").exists());

    let hits = index.query("reviews please", 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "reviews.txt");
    assert_eq!(hits[0].chunk_index, Some(0));
    assert!(hits[0].score > 0.9 && hits[0].score < 1.0001);
}

#[tokio::test]
async fn test_load_reads_persisted_index() {
    let dir = knowledge_dir().await;
    let index_path = dir.path().join("vectors.json");

    let builder = VectorIndex::new(&index_path, Arc::new(MarkerEmbedder::new()), 800, 100);
    builder.rebuild(dir.path()).await.unwrap();

    let reader = VectorIndex::new(&index_path, Arc::new(MarkerEmbedder::new()), 800, 100);
    assert!(reader.is_empty());
    assert_eq!(reader.load().await.unwrap(), 2);
    assert_eq!(reader.snapshot().model, "marker-test");
}

#[tokio::test]
async fn test_load_missing_file_is_empty() {
    let dir = TempDir::new().unwrap();
    let index = VectorIndex::new(
        dir.path().join("nope.json"),
        Arc::new(MarkerEmbedder::new()),
        800,
        100,
    );
    assert_eq!(index.load().await.unwrap(), 0);
    assert!(index.query("anything", 3).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rebuild_replaces_previous_chunks() {
    let dir = knowledge_dir().await;
    let index = VectorIndex::new(
        dir.path().join("v.json"),
        Arc::new(MarkerEmbedder::new()),
        800,
        100,
    );
    index.rebuild(dir.path()).await.unwrap();

    tokio::fs::remove_file(dir.path().join("reviews.txt")).await.unwrap();
    assert_eq!(index.rebuild(dir.path()).await.unwrap(), 1);
    assert!(index.snapshot().items.iter().all(|r| r.file == "citations.md"));
}

#[tokio::test]
async fn test_facade_prefers_vector_index() {
    let dir = knowledge_dir().await;
    let store = Arc::new(KnowledgeStore::default());
    store.load_dir(dir.path()).await.unwrap();

    let index = Arc::new(VectorIndex::new(
        dir.path().join("v.json"),
        Arc::new(MarkerEmbedder::new()),
        800,
        100,
    ));
    index.rebuild(dir.path()).await.unwrap();

    let base = KnowledgeBase::new(store).with_index(index);
    let hits = base.search("citations", 2).await;
    assert_eq!(hits[0].title, "citations.md");
    assert!(hits[0].chunk_index.is_some());
}

#[tokio::test]
async fn test_facade_falls_back_on_embedding_failure() {
    let dir = knowledge_dir().await;
    let index_path = dir.path().join("v.json");
    VectorIndex::new(&index_path, Arc::new(MarkerEmbedder::new()), 800, 100)
        .rebuild(dir.path())
        .await
        .unwrap();

    let failing = Arc::new(VectorIndex::new(&index_path, Arc::new(FailingEmbedder), 800, 100));
    failing.load().await.unwrap();

    let store = Arc::new(KnowledgeStore::default());
    store.replace(vec![KnowledgeItem::new("citations.md", "Citations and NAP")]);

    let base = KnowledgeBase::new(store).with_index(failing);
    let hits = base.search("citations", 5).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].score, 3.0);
    assert!(hits[0].chunk_index.is_none());
}

#[tokio::test]
async fn test_facade_without_index_uses_keywords() {
    let store = Arc::new(KnowledgeStore::default());
    store.replace(vec![KnowledgeItem::new("speed.md", "Page speed basics")]);
    let base = KnowledgeBase::new(store);
    assert_eq!(base.search("speed", 5).await.len(), 1);
}
