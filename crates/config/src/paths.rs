//! Data directory layout

use std::path::{Path, PathBuf};

/// Root data directory (~/.seopilot), or `.seopilot` when no home is known
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".seopilot"))
        .unwrap_or_else(|| PathBuf::from(".seopilot"))
}

/// Configuration file location
pub fn config_path() -> PathBuf {
    data_dir().join("config.json")
}

/// Knowledge documents folder
pub fn knowledge_dir() -> PathBuf {
    data_dir().join("knowledge")
}

/// Persisted conversation memory
pub fn memory_path() -> PathBuf {
    data_dir().join("memory.json")
}

/// Persisted embedding index
pub fn vector_index_path() -> PathBuf {
    data_dir().join("vectors.json")
}

/// Audit records
pub fn audits_dir() -> PathBuf {
    data_dir().join("audits")
}

/// Lead list consumed by the `list_leads` tool
pub fn leads_path() -> PathBuf {
    data_dir().join("leads.json")
}

/// Ensure directory exists
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Sanitize an identifier for use as a file name
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            _ => c,
        })
        .collect()
}
