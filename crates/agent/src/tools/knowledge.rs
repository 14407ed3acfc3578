//! Knowledge search tool

use async_trait::async_trait;
use seopilot_knowledge::KnowledgeBase;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{required_str, ToolResult, ToolTrait};

const MAX_LIMIT: u64 = 20;

pub struct SearchKnowledgeTool {
    knowledge: Arc<KnowledgeBase>,
    default_limit: usize,
}

impl SearchKnowledgeTool {
    pub fn new(knowledge: Arc<KnowledgeBase>, default_limit: usize) -> Self {
        Self {
            knowledge,
            default_limit: default_limit.max(1),
        }
    }
}

#[async_trait]
impl ToolTrait for SearchKnowledgeTool {
    fn name(&self) -> &str {
        "search_knowledge"
    }

    fn description(&self) -> &str {
        "Search the consultant's reference notes (checklists, playbooks, pricing) and return matching snippets."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Words or phrase to look for" },
                "limit": { "type": "integer", "description": "Maximum results", "minimum": 1, "maximum": MAX_LIMIT }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let query = required_str(&args, "query")?;
        let limit = args["limit"]
            .as_u64()
            .map(|l| l.clamp(1, MAX_LIMIT) as usize)
            .unwrap_or(self.default_limit);

        let results = self.knowledge.search(&query, limit).await;
        Ok(json!({
            "query": query,
            "count": results.len(),
            "results": results,
        }))
    }
}
