//! Report link delivery tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{required_str, ToolResult, ToolTrait};
use crate::services::{Channel, Notifier};

pub struct SendReportLinkTool {
    notifier: Arc<dyn Notifier>,
}

impl SendReportLinkTool {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl ToolTrait for SendReportLinkTool {
    fn name(&self) -> &str {
        "send_report_link"
    }

    fn description(&self) -> &str {
        "Send a report link to a client by email or SMS."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string", "enum": ["email", "sms"] },
                "target": { "type": "string", "description": "Email address or phone number" },
                "link": { "type": "string", "description": "Report URL" }
            },
            "required": ["channel", "target", "link"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let channel: Channel = required_str(&args, "channel")?.parse()?;
        let target = required_str(&args, "target")?;
        let link = required_str(&args, "link")?;

        let delivery = self.notifier.send(channel, &target, &link).await?;
        Ok(json!(delivery))
    }
}
