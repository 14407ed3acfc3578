//! Audit and report tools

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

use super::{optional_str, required_str, ToolError, ToolResult, ToolTrait};
use crate::services::{AuditRequest, AuditRunner, AuditStore};

/// Runs a full audit and stores the result
pub struct StartAuditTool {
    runner: Arc<dyn AuditRunner>,
    store: Arc<dyn AuditStore>,
}

impl StartAuditTool {
    pub fn new(runner: Arc<dyn AuditRunner>, store: Arc<dyn AuditStore>) -> Self {
        Self { runner, store }
    }
}

#[async_trait]
impl ToolTrait for StartAuditTool {
    fn name(&self) -> &str {
        "start_audit"
    }

    fn description(&self) -> &str {
        "Run a local SEO audit for a business and save it. Returns the audit id and a summary."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "business_name": { "type": "string", "description": "Business name as listed" },
                "website": { "type": "string", "description": "Business website URL" },
                "location": { "type": "string", "description": "City or area" },
                "industry": { "type": "string", "description": "Industry, e.g. dentist" },
                "profile_id": { "type": "string", "description": "Client profile that owns the audit" }
            },
            "required": ["business_name"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let request = AuditRequest {
            business_name: required_str(&args, "business_name")?,
            website: optional_str(&args, "website"),
            location: optional_str(&args, "location"),
            industry: optional_str(&args, "industry"),
            profile_id: optional_str(&args, "profile_id"),
        };

        let audit = self.runner.run_full_audit(&request).await?;
        let summary = audit["summary"].as_str().unwrap_or_default().to_string();
        let score = audit["score"].clone();
        let audit_id = self
            .store
            .save_audit(audit, request.profile_id.as_deref())
            .await?;

        info!("Audit {} created for {}", audit_id, request.business_name);
        Ok(json!({
            "audit_id": audit_id,
            "business_name": request.business_name,
            "score": score,
            "summary": summary,
        }))
    }
}

/// Renders a stored audit as a markdown report
pub struct GenerateReportTool {
    store: Arc<dyn AuditStore>,
}

impl GenerateReportTool {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }
}

pub fn render_report(audit: &Value) -> String {
    let name = audit["business_name"].as_str().unwrap_or("Unknown business");
    let mut report = format!("# Local SEO report: {}\n\n", name);

    if let Some(score) = audit["score"].as_u64() {
        let _ = writeln!(report, "**Score:** {}/100\n", score);
    }
    if let Some(summary) = audit["summary"].as_str() {
        let _ = writeln!(report, "{}\n", summary);
    }

    if let Some(checks) = audit["checks"].as_array() {
        report.push_str("## Checks\n\n");
        for check in checks {
            let _ = writeln!(
                report,
                "- **{}** ({}): {}",
                check["name"].as_str().unwrap_or("check"),
                check["status"].as_str().unwrap_or("unknown"),
                check["detail"].as_str().unwrap_or("")
            );
        }
        report.push('\n');

        let actions: Vec<&str> = checks
            .iter()
            .filter_map(|c| c["recommendation"].as_str())
            .collect();
        if !actions.is_empty() {
            report.push_str("## Next steps\n\n");
            for (i, action) in actions.iter().enumerate() {
                let _ = writeln!(report, "{}. {}", i + 1, action);
            }
            report.push('\n');
        }
    }

    let market = &audit["market_position"];
    if market.is_object() {
        report.push_str("## Market position\n\n");
        let _ = writeln!(
            report,
            "Rated #{} against {} nearby competitors.",
            market["rating_rank"].as_u64().unwrap_or(0),
            market["competitor_count"].as_u64().unwrap_or(0)
        );
    }

    report.trim_end().to_string()
}

#[async_trait]
impl ToolTrait for GenerateReportTool {
    fn name(&self) -> &str {
        "generate_report"
    }

    fn description(&self) -> &str {
        "Generate a client-ready markdown report from a saved audit."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "audit_id": { "type": "string", "description": "Id returned by start_audit" }
            },
            "required": ["audit_id"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let audit_id = required_str(&args, "audit_id")?;
        let audit = self
            .store
            .get_audit(&audit_id)
            .await?
            .ok_or_else(|| ToolError::Execution(format!("Audit {} not found", audit_id)))?;

        Ok(json!({
            "audit_id": audit_id,
            "report": render_report(&audit),
        }))
    }
}
