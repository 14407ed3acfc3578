//! Templated audit runner

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{AuditRequest, AuditRunner, Place, PlacesProvider, ServiceError, ServiceResult};

const COMPETITOR_RADIUS_METERS: u32 = 5000;
const GOOD_RATING: f64 = 4.0;
const GOOD_REVIEW_COUNT: u64 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Serialize)]
struct Check {
    name: &'static str,
    status: CheckStatus,
    detail: String,
    recommendation: Option<&'static str>,
}

impl Check {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
            recommendation: None,
        }
    }

    fn recommend(mut self, text: &'static str) -> Self {
        if self.status != CheckStatus::Pass {
            self.recommendation = Some(text);
        }
        self
    }
}

/// Builds an audit from fixed checks, enriched with listing data when a
/// places provider is available
pub struct TemplateAuditRunner {
    places: Option<Arc<dyn PlacesProvider>>,
}

impl TemplateAuditRunner {
    pub fn new(places: Option<Arc<dyn PlacesProvider>>) -> Self {
        Self { places }
    }

    async fn lookup(&self, request: &AuditRequest) -> (Option<Place>, Vec<Place>) {
        let Some(places) = &self.places else {
            return (None, Vec::new());
        };

        let place = match places
            .find_business(&request.business_name, request.location.as_deref())
            .await
        {
            Ok(place) => place,
            Err(e) => {
                warn!("Business lookup failed for {}: {}", request.business_name, e);
                return (None, Vec::new());
            }
        };

        let Some(place) = place else {
            return (None, Vec::new());
        };

        let competitors = places
            .find_competitors(&place, request.industry.as_deref(), COMPETITOR_RADIUS_METERS)
            .await
            .unwrap_or_else(|e| {
                warn!("Competitor lookup failed for {}: {}", place.name, e);
                Vec::new()
            });

        (Some(place), competitors)
    }
}

fn checks_for(request: &AuditRequest, place: Option<&Place>) -> Vec<Check> {
    let mut checks = Vec::new();

    checks.push(match &request.website {
        Some(site) if site.starts_with("https://") => {
            Check::new("website", CheckStatus::Pass, format!("{} is served over HTTPS", site))
        }
        Some(site) => Check::new("website", CheckStatus::Warn, format!("{} is not confirmed as HTTPS", site))
            .recommend("Serve the site over HTTPS and redirect plain HTTP."),
        None => Check::new("website", CheckStatus::Fail, "No website on record")
            .recommend("Add a website so search engines can link the listing to a domain."),
    });

    checks.push(match place {
        Some(p) => Check::new(
            "business_listing",
            CheckStatus::Pass,
            format!("Found listing '{}'", p.name),
        ),
        None => Check::new("business_listing", CheckStatus::Warn, "No business listing was found")
            .recommend("Claim and verify the Google Business Profile."),
    });

    if let Some(p) = place {
        let rating = p.rating.unwrap_or(0.0);
        let status = if rating >= GOOD_RATING { CheckStatus::Pass } else { CheckStatus::Warn };
        checks.push(
            Check::new("rating", status, format!("Average rating {:.1}", rating))
                .recommend("Respond to reviews and follow up with happy customers."),
        );

        let reviews = p.review_count.unwrap_or(0);
        let status = if reviews >= GOOD_REVIEW_COUNT { CheckStatus::Pass } else { CheckStatus::Warn };
        checks.push(
            Check::new("reviews", status, format!("{} reviews", reviews))
                .recommend("Set up a steady review request routine."),
        );
    }

    checks.push(match &request.location {
        Some(location) => Check::new(
            "nap_consistency",
            CheckStatus::Warn,
            format!("Verify name, address and phone match across citations in {}", location),
        )
        .recommend("Audit the top directories for matching name, address and phone."),
        None => Check::new("nap_consistency", CheckStatus::Fail, "No location on record")
            .recommend("Add a service area or address to anchor local rankings."),
    });

    checks
}

/// Percentage of passing checks, warnings count half
fn score(checks: &[Check]) -> u32 {
    if checks.is_empty() {
        return 0;
    }
    let points: f64 = checks
        .iter()
        .map(|c| match c.status {
            CheckStatus::Pass => 1.0,
            CheckStatus::Warn => 0.5,
            CheckStatus::Fail => 0.0,
        })
        .sum();
    (points / checks.len() as f64 * 100.0).round() as u32
}

fn market_position(place: &Place, competitors: &[Place]) -> Value {
    let rated: Vec<f64> = competitors.iter().filter_map(|c| c.rating).collect();
    let average = if rated.is_empty() {
        None
    } else {
        Some(rated.iter().sum::<f64>() / rated.len() as f64)
    };
    let own = place.rating.unwrap_or(0.0);
    let rank = 1 + rated.iter().filter(|r| **r > own).count();

    json!({
        "competitor_count": competitors.len(),
        "average_competitor_rating": average,
        "rating_rank": rank,
        "top_competitors": competitors.iter().take(3).map(|c| &c.name).collect::<Vec<_>>(),
    })
}

#[async_trait]
impl AuditRunner for TemplateAuditRunner {
    async fn run_full_audit(&self, request: &AuditRequest) -> ServiceResult<Value> {
        if request.business_name.trim().is_empty() {
            return Err(ServiceError::Invalid("business_name must not be empty".to_string()));
        }

        let (place, competitors) = self.lookup(request).await;
        let checks = checks_for(request, place.as_ref());
        let score = score(&checks);
        let open_items = checks.iter().filter(|c| c.status != CheckStatus::Pass).count();

        let mut audit = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "business_name": request.business_name,
            "website": request.website,
            "location": request.location,
            "industry": request.industry,
            "profile_id": request.profile_id,
            "created_at": Utc::now(),
            "score": score,
            "checks": checks,
            "summary": format!(
                "{} scored {}/100 with {} item(s) to address.",
                request.business_name, score, open_items
            ),
        });

        if let Some(place) = &place {
            audit["place"] = json!(place);
            audit["market_position"] = market_position(place, &competitors);
        }

        debug!("Audit for {} scored {}", request.business_name, score);
        Ok(audit)
    }
}
