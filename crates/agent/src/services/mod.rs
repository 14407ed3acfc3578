//! External collaborators used by the business tools
//!
//! Each concern is a trait so the tools never depend on a particular
//! backend. Default implementations live in the submodules.

pub mod audit;
pub mod notify;
pub mod places;
pub mod store;

pub use audit::TemplateAuditRunner;
pub use notify::WebhookNotifier;
pub use places::GooglePlacesProvider;
pub use store::{FileAuditStore, InMemoryAuditStore};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Invalid(String),
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// A business tracked as a prospect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: String,
    pub business_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default = "default_lead_status")]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_lead_status() -> String {
    "new".to_string()
}

/// Audit storage
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist an audit and return its id
    async fn save_audit(&self, audit: Value, owner_id: Option<&str>) -> ServiceResult<String>;
    async fn get_audit(&self, id: &str) -> ServiceResult<Option<Value>>;
    async fn list_leads(&self) -> ServiceResult<Vec<Lead>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" | "text" => Ok(Channel::Sms),
            other => Err(ServiceError::Invalid(format!(
                "Unsupported channel '{}', expected email or sms",
                other
            ))),
        }
    }
}

/// Outcome of a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub ok: bool,
    /// Set when no credentials were configured and nothing was sent
    pub simulated: bool,
    pub channel: Channel,
    pub target: String,
    pub link: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: Channel, target: &str, link: &str) -> ServiceResult<Delivery>;
}

/// Business listing data
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Place {
    pub place_id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: Option<u64>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

#[async_trait]
pub trait PlacesProvider: Send + Sync {
    async fn find_business(&self, name: &str, location: Option<&str>) -> ServiceResult<Option<Place>>;
    async fn find_competitors(
        &self,
        place: &Place,
        kind: Option<&str>,
        radius_meters: u32,
    ) -> ServiceResult<Vec<Place>>;
}

/// Inputs for a full audit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditRequest {
    pub business_name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
}

#[async_trait]
pub trait AuditRunner: Send + Sync {
    async fn run_full_audit(&self, request: &AuditRequest) -> ServiceResult<Value>;
}

/// Upstream error text from a JSON body, else the status reason
pub(crate) fn upstream_error(status: reqwest::StatusCode, body: &str) -> ServiceError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v["error"]["message"]
                .as_str()
                .or_else(|| v["error"].as_str())
                .or_else(|| v["message"].as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());
    ServiceError::Upstream {
        status: status.as_u16(),
        message,
    }
}
