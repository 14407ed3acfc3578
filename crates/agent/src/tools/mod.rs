//! Tool registry and the built-in tools

pub mod audit;
pub mod knowledge;
pub mod leads;
pub mod message;
pub mod url_guard;
pub mod web;

pub use audit::{GenerateReportTool, StartAuditTool};
pub use knowledge::SearchKnowledgeTool;
pub use leads::ListLeadsTool;
pub use message::SendReportLinkTool;
pub use url_guard::{AddressPolicy, HostLookup, SystemLookup};
pub use web::FetchWebsiteTool;

use async_trait::async_trait;
use seopilot_provider::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Tool failures; the brain loop records these instead of aborting
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required parameter '{param}' for tool {tool}")]
    MissingParameter { tool: String, param: String },

    #[error("Tool {0} not allowed")]
    Disallowed(String),

    #[error("{0}")]
    Execution(String),
}

impl ToolError {
    pub fn execution(message: impl std::fmt::Display) -> Self {
        ToolError::Execution(message.to_string())
    }
}

impl From<crate::services::ServiceError> for ToolError {
    fn from(e: crate::services::ServiceError) -> Self {
        ToolError::Execution(e.to_string())
    }
}

pub type ToolResult = std::result::Result<Value, ToolError>;

type BoxedTool = Box<dyn ToolTrait + Send + Sync>;

#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON-schema-like object; `required` lists mandatory fields
    fn parameters(&self) -> Value;
    async fn execute(&self, args: Value) -> ToolResult;
}

pub fn to_definition(tool: &dyn ToolTrait) -> ToolDefinition {
    ToolDefinition::new(tool.name(), tool.description(), tool.parameters())
}

/// Named tools, immutable once shared with the brain loop
pub struct ToolRegistry {
    tools: HashMap<String, BoxedTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) {
        let name = tool.name().to_string();
        self.tools.insert(name, Box::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&(dyn ToolTrait + Send + Sync)> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// `None` allows everything
    pub fn is_allowed(name: &str, allow_list: Option<&[String]>) -> bool {
        allow_list.map_or(true, |list| list.iter().any(|n| n == name))
    }

    /// Definitions of the allowed tools, sorted by name
    pub fn definitions(&self, allow_list: Option<&[String]>) -> Vec<ToolDefinition> {
        let mut definitions: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| Self::is_allowed(t.name(), allow_list))
            .map(|t| to_definition(t.as_ref()))
            .collect();
        definitions.sort_by(|a, b| a.name.cmp(&b.name));
        definitions
    }

    /// Run a tool after checking its required parameters.
    ///
    /// A missing or null required field fails before the tool body runs.
    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let definition = to_definition(tool.as_ref());
        for field in definition.required_fields() {
            let present = args.get(field).map_or(false, |v| !v.is_null());
            if !present {
                return Err(ToolError::MissingParameter {
                    tool: name.to_string(),
                    param: field.to_string(),
                });
            }
        }

        debug!("Executing tool {}", name);
        tool.execute(args).await
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborators the built-in tools need
pub struct ToolDeps {
    pub knowledge: std::sync::Arc<seopilot_knowledge::KnowledgeBase>,
    pub knowledge_limit: usize,
    pub store: std::sync::Arc<dyn crate::services::AuditStore>,
    pub runner: std::sync::Arc<dyn crate::services::AuditRunner>,
    pub notifier: std::sync::Arc<dyn crate::services::Notifier>,
    pub fetch_policy: AddressPolicy,
    pub fetch_timeout: std::time::Duration,
    pub fetch_max_chars: usize,
}

/// Register every built-in tool
pub fn register_default_tools(registry: &mut ToolRegistry, deps: ToolDeps) -> Result<(), ToolError> {
    registry.register(SearchKnowledgeTool::new(deps.knowledge, deps.knowledge_limit));
    registry.register(FetchWebsiteTool::new(
        deps.fetch_policy,
        deps.fetch_timeout,
        deps.fetch_max_chars,
    )?);
    registry.register(ListLeadsTool::new(deps.store.clone()));
    registry.register(StartAuditTool::new(deps.runner, deps.store.clone()));
    registry.register(GenerateReportTool::new(deps.store));
    registry.register(SendReportLinkTool::new(deps.notifier));
    Ok(())
}

/// Read an optional string argument, treating blank as absent
pub(crate) fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Read a string argument the registry already checked for presence
pub(crate) fn required_str(args: &Value, key: &str) -> Result<String, ToolError> {
    optional_str(args, key)
        .ok_or_else(|| ToolError::Execution(format!("Parameter '{}' must be a non-empty string", key)))
}
