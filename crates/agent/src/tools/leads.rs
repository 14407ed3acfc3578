//! Lead listing tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{optional_str, ToolResult, ToolTrait};
use crate::services::AuditStore;

const DEFAULT_LIMIT: u64 = 20;

pub struct ListLeadsTool {
    store: Arc<dyn AuditStore>,
}

impl ListLeadsTool {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolTrait for ListLeadsTool {
    fn name(&self) -> &str {
        "list_leads"
    }

    fn description(&self) -> &str {
        "List tracked leads (prospective clients), optionally filtered by status."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "description": "Maximum leads to return", "minimum": 1 },
                "status": { "type": "string", "description": "Only leads with this status, e.g. new or audited" }
            },
            "required": []
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let limit = args["limit"].as_u64().unwrap_or(DEFAULT_LIMIT).max(1) as usize;
        let status = optional_str(&args, "status").map(|s| s.to_lowercase());

        let leads: Vec<_> = self
            .store
            .list_leads()
            .await?
            .into_iter()
            .filter(|l| status.as_ref().map_or(true, |s| l.status.eq_ignore_ascii_case(s)))
            .collect();
        let total = leads.len();
        let leads: Vec<_> = leads.into_iter().take(limit).collect();

        Ok(json!({
            "total": total,
            "count": leads.len(),
            "leads": leads,
        }))
    }
}
