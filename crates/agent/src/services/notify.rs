//! Report-link notifications over a webhook

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::{upstream_error, Channel, Delivery, Notifier, ServiceResult};

/// Posts `{channel, target, link}` to a webhook that fans out to email/SMS.
///
/// Without a webhook URL every send is simulated.
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
    api_key: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Never sends anything
    pub fn simulated() -> Self {
        Self::new("", "")
    }

    pub fn is_configured(&self) -> bool {
        !self.webhook_url.trim().is_empty()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, channel: Channel, target: &str, link: &str) -> ServiceResult<Delivery> {
        let delivery = |simulated| Delivery {
            ok: true,
            simulated,
            channel,
            target: target.to_string(),
            link: link.to_string(),
        };

        if !self.is_configured() {
            info!("Notifier not configured, simulating {} to {}", channel, target);
            return Ok(delivery(true));
        }

        let mut request = self
            .client
            .post(&self.webhook_url)
            .timeout(Duration::from_secs(10))
            .json(&json!({ "channel": channel, "target": target, "link": link }));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status, &body));
        }

        debug!("Sent {} notification to {}", channel, target);
        Ok(delivery(false))
    }
}
