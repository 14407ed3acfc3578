//! Keyword store loading and concurrent access

use seopilot_knowledge::{KnowledgeItem, KnowledgeStore};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_load_dir_filters_and_sorts() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("b.txt"), "second").await.unwrap();
    tokio::fs::write(dir.path().join("a.md"), "first").await.unwrap();
    tokio::fs::write(dir.path().join("c.json"), r#"{"k": "v"}"#).await.unwrap();
    tokio::fs::write(dir.path().join("d.png"), "binary").await.unwrap();
    tokio::fs::create_dir(dir.path().join("nested.md")).await.unwrap();

    let store = KnowledgeStore::default();
    let count = store.load_dir(dir.path()).await.unwrap();

    assert_eq!(count, 3);
    assert_eq!(store.titles(), vec!["a.md", "b.txt", "c.json"]);
}

#[tokio::test]
async fn test_load_missing_dir_is_empty() {
    let dir = TempDir::new().unwrap();
    let store = KnowledgeStore::default();
    assert_eq!(store.load_dir(&dir.path().join("missing")).await.unwrap(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_reload_replaces_whole_set() {
    let dir = TempDir::new().unwrap();
    tokio::fs::write(dir.path().join("old.md"), "old").await.unwrap();
    let store = KnowledgeStore::default();
    store.load_dir(dir.path()).await.unwrap();

    tokio::fs::remove_file(dir.path().join("old.md")).await.unwrap();
    tokio::fs::write(dir.path().join("new.md"), "new").await.unwrap();
    store.load_dir(dir.path()).await.unwrap();

    assert_eq!(store.titles(), vec!["new.md"]);
}

#[test]
fn test_search_is_repeatable() {
    let store = KnowledgeStore::default();
    store.replace(vec![
        KnowledgeItem::new("gbp.md", "Google Business Profile categories and local ranking"),
        KnowledgeItem::new("local-ranking.md", "Local ranking factors"),
        KnowledgeItem::new("misc.md", "nothing relevant"),
    ]);

    let first = store.search("local ranking", 10);
    let second = store.search("local ranking", 10);
    assert_eq!(first, second);
    assert_eq!(first[0].title, "local-ranking.md");
}

#[tokio::test]
async fn test_queries_during_reload_see_whole_sets() {
    let store = Arc::new(KnowledgeStore::default());
    let old: Vec<KnowledgeItem> = (0..50)
        .map(|i| KnowledgeItem::new(format!("old-{i}.md"), "shared term"))
        .collect();
    let new: Vec<KnowledgeItem> = (0..80)
        .map(|i| KnowledgeItem::new(format!("new-{i}.md"), "shared term"))
        .collect();
    store.replace(old);

    let writer = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            for _ in 0..20 {
                store.replace(new.clone());
                tokio::task::yield_now().await;
            }
        })
    };

    let mut readers = Vec::new();
    for _ in 0..4 {
        let store = Arc::clone(&store);
        readers.push(tokio::spawn(async move {
            for _ in 0..50 {
                let hits = store.search("shared term", 1000);
                let old_count = hits.iter().filter(|h| h.title.starts_with("old-")).count();
                let new_count = hits.iter().filter(|h| h.title.starts_with("new-")).count();
                assert!(
                    (old_count == 50 && new_count == 0) || (old_count == 0 && new_count == 80)
                );
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}
