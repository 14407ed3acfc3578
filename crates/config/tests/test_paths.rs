//! Tests for path utilities

use seopilot_config::paths::{
    audits_dir, config_path, data_dir, ensure_dir, expand_home, knowledge_dir, memory_path,
    safe_filename, vector_index_path,
};

#[test]
fn test_safe_filename_special_chars() {
    assert_eq!(safe_filename("file<name>"), "file_name_");
    assert_eq!(safe_filename("conv:123"), "conv_123");
    assert_eq!(safe_filename("a/b\\c"), "a_b_c");
    assert_eq!(safe_filename("normal-name_1.json"), "normal-name_1.json");
}

#[test]
fn test_layout_under_data_dir() {
    let root = data_dir();
    assert!(root.ends_with(".seopilot"));
    assert_eq!(config_path(), root.join("config.json"));
    assert_eq!(knowledge_dir(), root.join("knowledge"));
    assert_eq!(memory_path(), root.join("memory.json"));
    assert_eq!(vector_index_path(), root.join("vectors.json"));
    assert_eq!(audits_dir(), root.join("audits"));
}

#[test]
fn test_expand_home() {
    let plain = expand_home("/var/data");
    assert_eq!(plain, std::path::PathBuf::from("/var/data"));

    if let Some(home) = dirs::home_dir() {
        assert_eq!(expand_home("~/x"), home.join("x"));
        assert_eq!(expand_home("~"), home);
    }
}

#[tokio::test]
async fn test_ensure_dir_creates_nested() {
    let temp = tempfile::tempdir().unwrap();
    let nested = temp.path().join("a").join("b");
    ensure_dir(&nested).await.unwrap();
    assert!(nested.is_dir());
}
