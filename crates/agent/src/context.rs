//! Prompt assembly for the brain loop

use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::debug;

use seopilot_provider::Message;

/// Builds the initial message list: persona, optional memory, prompt
pub struct ContextBuilder {
    data_dir: Option<PathBuf>,
}

impl ContextBuilder {
    /// Optional files in the data directory appended to the persona
    const OVERRIDE_FILES: &'static [&'static str] = &["PERSONA.md", "POLICY.md"];

    pub fn new() -> Self {
        Self { data_dir: None }
    }

    /// Also load persona overrides from `data_dir`
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Self {
            data_dir: Some(data_dir.as_ref().to_path_buf()),
        }
    }

    pub async fn build_system_prompt(&self) -> String {
        let mut parts = vec![self.persona()];

        let overrides = self.load_override_files().await;
        if !overrides.is_empty() {
            parts.push(overrides);
        }

        parts.join("\n\n---\n\n")
    }

    fn persona(&self) -> String {
        let today = Utc::now().format("%Y-%m-%d (%A)");
        format!(
            r#"# SEOPilot

You are SEOPilot, an assistant for digital-marketing consultants who run local SEO for small businesses.

You can:
- search the consultant's knowledge notes
- fetch public websites to review titles, descriptions and headings
- list leads, start audits and turn saved audits into reports
- send report links to clients by email or SMS

## Today
{}

## Rules
- Use tools when they give you facts you do not already have. Do not guess audit ids or contact details.
- If a tool returns an error, say briefly what failed and continue with what you have.
- Never fetch private or local network addresses.
- Keep answers short, concrete and ready to send to a client."#,
            today
        )
    }

    async fn load_override_files(&self) -> String {
        let Some(dir) = &self.data_dir else {
            return String::new();
        };

        let mut parts = Vec::new();
        for filename in Self::OVERRIDE_FILES {
            let path = dir.join(filename);
            if !path.exists() {
                continue;
            }
            match tokio::fs::read_to_string(&path).await {
                Ok(content) if !content.trim().is_empty() => {
                    parts.push(format!("## {}\n\n{}", filename, content.trim()));
                }
                Ok(_) => {}
                Err(e) => debug!("Failed to read {}: {}", filename, e),
            }
        }
        parts.join("\n\n")
    }

    /// System persona, then a memory snippet if any, then the prompt
    pub async fn build_messages(&self, prompt: &str, memory_snippet: Option<String>) -> Vec<Message> {
        let mut messages = vec![Message::system(self.build_system_prompt().await)];
        if let Some(snippet) = memory_snippet.filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(format!(
                "Recent conversation for context:\n{}",
                snippet
            )));
        }
        messages.push(Message::user(prompt));
        messages
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
