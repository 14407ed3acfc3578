//! Conversation memory
//!
//! Bounded per-conversation history shared by every brain invocation,
//! persisted to one JSON file and flushed on a schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of entries kept per conversation
pub const DEFAULT_MAX_ENTRIES: usize = 20;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("memory io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("memory json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MemoryError>;

/// One remembered turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// user or assistant
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A bounded conversation history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub entries: Vec<MemoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

fn default_max_entries() -> usize {
    DEFAULT_MAX_ENTRIES
}

impl Conversation {
    pub fn new(id: impl Into<String>, max_entries: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
            max_entries,
        }
    }

    /// Add an entry, dropping the oldest ones past `max_entries`
    pub fn push(&mut self, role: impl Into<String>, content: impl Into<String>) {
        let now = Utc::now();
        self.entries.push(MemoryEntry {
            role: role.into(),
            content: content.into(),
            timestamp: now,
        });
        self.updated_at = now;
        self.enforce_max_entries();
    }

    fn enforce_max_entries(&mut self) {
        if self.entries.len() > self.max_entries {
            let to_remove = self.entries.len() - self.max_entries;
            self.entries.drain(0..to_remove);
            debug!("Conversation {} trimmed to {} entries", self.id, self.entries.len());
        }
    }

    /// Last `n` entries, oldest first
    pub fn recent(&self, n: usize) -> &[MemoryEntry] {
        &self.entries[self.entries.len().saturating_sub(n)..]
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryFile {
    conversations: HashMap<String, Conversation>,
}

/// Shared conversation store.
///
/// Appends take the write lock, so concurrent appends to the same id are
/// all kept.
pub struct ConversationMemory {
    path: Option<PathBuf>,
    conversations: RwLock<HashMap<String, Conversation>>,
    max_entries: usize,
    dirty: AtomicBool,
}

impl ConversationMemory {
    /// Memory that lives only in this process
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            path: None,
            conversations: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
            dirty: AtomicBool::new(false),
        }
    }

    /// Memory backed by `path`, loaded if the file exists.
    ///
    /// An unreadable or corrupt file starts empty rather than failing.
    pub async fn load(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let mut memory = Self::in_memory(max_entries);

        match read_file(&path).await {
            Ok(Some(file)) => {
                let mut conversations = file.conversations;
                for conversation in conversations.values_mut() {
                    conversation.max_entries = memory.max_entries;
                    conversation.enforce_max_entries();
                }
                info!("Loaded {} conversations from {}", conversations.len(), path.display());
                memory.conversations = RwLock::new(conversations);
            }
            Ok(None) => debug!("No memory file at {}", path.display()),
            Err(e) => warn!("Failed to load memory from {}: {}", path.display(), e),
        }

        memory.path = Some(path);
        memory
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub async fn append(&self, id: &str, role: &str, content: &str) {
        let mut conversations = self.conversations.write().await;
        conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id, self.max_entries))
            .push(role, content);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Record a prompt and its answer as adjacent entries
    pub async fn append_exchange(&self, id: &str, prompt: &str, answer: &str) {
        let mut conversations = self.conversations.write().await;
        let conversation = conversations
            .entry(id.to_string())
            .or_insert_with(|| Conversation::new(id, self.max_entries));
        conversation.push("user", prompt);
        conversation.push("assistant", answer);
        self.dirty.store(true, Ordering::SeqCst);
    }

    /// Last `n` entries of a conversation, oldest first
    pub async fn recent(&self, id: &str, n: usize) -> Vec<MemoryEntry> {
        self.conversations
            .read()
            .await
            .get(id)
            .map(|c| c.recent(n).to_vec())
            .unwrap_or_default()
    }

    /// Recent turns as `role: content` lines, keeping the newest lines
    /// within `max_chars`. `None` when there is nothing to show.
    pub async fn context_snippet(&self, id: &str, n: usize, max_chars: usize) -> Option<String> {
        let entries = self.recent(id, n).await;
        let mut lines: Vec<String> = Vec::new();
        let mut used = 0;
        for entry in entries.iter().rev() {
            let line = format!("{}: {}", entry.role, entry.content.trim());
            let len = line.chars().count() + 1;
            if used + len > max_chars && !lines.is_empty() {
                break;
            }
            used += len;
            lines.push(line);
        }
        if lines.is_empty() {
            return None;
        }
        lines.reverse();
        Some(lines.join("\n"))
    }

    pub async fn clear(&self, id: &str) -> bool {
        let removed = self.conversations.write().await.remove(id).is_some();
        if removed {
            self.dirty.store(true, Ordering::SeqCst);
        }
        removed
    }

    /// Known conversation ids, sorted
    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.conversations.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Write to disk when there are unsaved changes.
    ///
    /// Writes a sibling temp file and renames it into place. Returns whether
    /// anything was written.
    pub async fn save(&self) -> Result<bool> {
        let Some(path) = &self.path else {
            return Ok(false);
        };
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        let content = {
            let conversations = self.conversations.read().await;
            serde_json::to_vec_pretty(&MemoryFileRef {
                conversations: &*conversations,
            })
        };
        let content = match content {
            Ok(c) => c,
            Err(e) => {
                self.dirty.store(true, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        if let Err(e) = write_atomic(path, &content).await {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e.into());
        }
        debug!("Saved conversation memory to {}", path.display());
        Ok(true)
    }

    /// Flush every `every` until `token` is cancelled, then flush once more
    pub fn spawn_flush(self: &Arc<Self>, every: Duration, token: CancellationToken) -> JoinHandle<()> {
        let memory = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            info!("Memory flush task started (every {}s)", every.as_secs());
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(e) = memory.save().await {
                            warn!("Periodic memory flush failed: {}", e);
                        }
                    }
                }
            }

            if let Err(e) = memory.save().await {
                warn!("Final memory flush failed: {}", e);
            }
            debug!("Memory flush task stopped");
        })
    }
}

#[derive(Serialize)]
struct MemoryFileRef<'a> {
    conversations: &'a HashMap<String, Conversation>,
}

async fn read_file(path: &Path) -> Result<Option<MemoryFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = tokio::fs::read_to_string(path).await?;
    Ok(Some(serde_json::from_str(&content)?))
}

async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}
