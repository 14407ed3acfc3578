//! Audit persistence

use async_trait::async_trait;
use chrono::Utc;
use seopilot_config::paths::safe_filename;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::{AuditStore, Lead, ServiceResult};

/// Stamp `audit` with an id and owner, returning the id
fn prepare_audit(audit: &mut Value, owner_id: Option<&str>) -> String {
    let id = audit["id"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if let Some(obj) = audit.as_object_mut() {
        obj.insert("id".to_string(), json!(id));
        if let Some(owner) = owner_id {
            obj.insert("owner_id".to_string(), json!(owner));
        }
        obj.entry("saved_at").or_insert_with(|| json!(Utc::now()));
    }
    id
}

/// Audited businesses are tracked as leads
fn lead_from_audit(id: &str, audit: &Value) -> Option<Lead> {
    let business_name = audit["business_name"].as_str()?.to_string();
    let text = |key: &str| audit[key].as_str().map(|s| s.to_string());
    Some(Lead {
        id: id.to_string(),
        business_name,
        location: text("location"),
        industry: text("industry"),
        website: text("website"),
        status: "audited".to_string(),
        created_at: Some(Utc::now()),
    })
}

/// Replace a lead with the same business name, or add it
fn upsert_lead(leads: &mut Vec<Lead>, lead: Lead) {
    match leads
        .iter_mut()
        .find(|l| l.business_name.eq_ignore_ascii_case(&lead.business_name))
    {
        Some(existing) => {
            existing.status = lead.status;
            existing.website = lead.website.or(existing.website.take());
            existing.location = lead.location.or(existing.location.take());
            existing.industry = lead.industry.or(existing.industry.take());
        }
        None => leads.push(lead),
    }
}

/// One JSON file per audit plus a leads file
pub struct FileAuditStore {
    audits_dir: PathBuf,
    leads_path: PathBuf,
    leads_lock: Mutex<()>,
}

impl FileAuditStore {
    pub fn new(audits_dir: impl Into<PathBuf>, leads_path: impl Into<PathBuf>) -> Self {
        Self {
            audits_dir: audits_dir.into(),
            leads_path: leads_path.into(),
            leads_lock: Mutex::new(()),
        }
    }

    fn audit_path(&self, id: &str) -> PathBuf {
        self.audits_dir.join(format!("{}.json", safe_filename(id)))
    }

    async fn read_leads(&self) -> ServiceResult<Vec<Lead>> {
        if !self.leads_path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&self.leads_path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Add or update a lead by business name
    pub async fn save_lead(&self, lead: Lead) -> ServiceResult<()> {
        let _guard = self.leads_lock.lock().await;
        let mut leads = self.read_leads().await?;
        upsert_lead(&mut leads, lead);
        write_atomic(&self.leads_path, &serde_json::to_vec_pretty(&leads)?).await?;
        Ok(())
    }
}

async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await
}

#[async_trait]
impl AuditStore for FileAuditStore {
    async fn save_audit(&self, mut audit: Value, owner_id: Option<&str>) -> ServiceResult<String> {
        let id = prepare_audit(&mut audit, owner_id);
        let path = self.audit_path(&id);
        write_atomic(&path, &serde_json::to_vec_pretty(&audit)?).await?;
        info!("Saved audit {} to {}", id, path.display());

        if let Some(lead) = lead_from_audit(&id, &audit) {
            self.save_lead(lead).await?;
        }
        Ok(id)
    }

    async fn get_audit(&self, id: &str) -> ServiceResult<Option<Value>> {
        let path = self.audit_path(id);
        if !path.exists() {
            debug!("No audit at {}", path.display());
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn list_leads(&self) -> ServiceResult<Vec<Lead>> {
        self.read_leads().await
    }
}

/// Process-local store
#[derive(Default)]
pub struct InMemoryAuditStore {
    audits: RwLock<HashMap<String, Value>>,
    leads: RwLock<Vec<Lead>>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        Self {
            audits: RwLock::new(HashMap::new()),
            leads: RwLock::new(leads),
        }
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn save_audit(&self, mut audit: Value, owner_id: Option<&str>) -> ServiceResult<String> {
        let id = prepare_audit(&mut audit, owner_id);
        if let Some(lead) = lead_from_audit(&id, &audit) {
            upsert_lead(&mut *self.leads.write().await, lead);
        }
        self.audits.write().await.insert(id.clone(), audit);
        Ok(id)
    }

    async fn get_audit(&self, id: &str) -> ServiceResult<Option<Value>> {
        Ok(self.audits.read().await.get(id).cloned())
    }

    async fn list_leads(&self) -> ServiceResult<Vec<Lead>> {
        Ok(self.leads.read().await.clone())
    }
}
