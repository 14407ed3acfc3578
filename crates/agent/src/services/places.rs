//! Google Places lookups

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{upstream_error, Place, PlacesProvider, ServiceError, ServiceResult};

pub const PLACES_API_BASE: &str = "https://maps.googleapis.com/maps/api/place";

pub struct GooglePlacesProvider {
    client: Client,
    api_key: String,
    api_base: String,
}

impl GooglePlacesProvider {
    pub fn new(api_key: impl Into<String>, api_base: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: api_base
                .unwrap_or_else(|| PLACES_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn get(&self, endpoint: &str, query: &[(&str, String)]) -> ServiceResult<Vec<Place>> {
        let url = format!("{}/{}/json", self.api_base, endpoint);
        let response = self
            .client
            .get(&url)
            .query(query)
            .query(&[("key", &self.api_key)])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(upstream_error(status, &body));
        }

        let json: Value = serde_json::from_str(&body)?;
        match json["status"].as_str().unwrap_or("OK") {
            "OK" | "ZERO_RESULTS" => {}
            other => {
                let message = json["error_message"].as_str().unwrap_or(other);
                return Err(ServiceError::Invalid(format!("places lookup failed: {}", message)));
            }
        }

        let places: Vec<Place> = json["results"]
            .as_array()
            .map(|results| results.iter().filter_map(parse_place).collect())
            .unwrap_or_default();
        debug!("Places {} returned {} results", endpoint, places.len());
        Ok(places)
    }
}

fn parse_place(item: &Value) -> Option<Place> {
    Some(Place {
        place_id: item["place_id"].as_str()?.to_string(),
        name: item["name"].as_str()?.to_string(),
        address: item["formatted_address"]
            .as_str()
            .or_else(|| item["vicinity"].as_str())
            .map(|s| s.to_string()),
        rating: item["rating"].as_f64(),
        review_count: item["user_ratings_total"].as_u64(),
        types: item["types"]
            .as_array()
            .map(|t| t.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        lat: item["geometry"]["location"]["lat"].as_f64(),
        lng: item["geometry"]["location"]["lng"].as_f64(),
    })
}

#[async_trait]
impl PlacesProvider for GooglePlacesProvider {
    async fn find_business(&self, name: &str, location: Option<&str>) -> ServiceResult<Option<Place>> {
        let query = match location {
            Some(location) => format!("{} {}", name, location),
            None => name.to_string(),
        };
        Ok(self
            .get("textsearch", &[("query", query)])
            .await?
            .into_iter()
            .next())
    }

    async fn find_competitors(
        &self,
        place: &Place,
        kind: Option<&str>,
        radius_meters: u32,
    ) -> ServiceResult<Vec<Place>> {
        let (Some(lat), Some(lng)) = (place.lat, place.lng) else {
            return Ok(Vec::new());
        };

        let mut query = vec![
            ("location", format!("{},{}", lat, lng)),
            ("radius", radius_meters.to_string()),
        ];
        if let Some(kind) = kind.or_else(|| place.types.first().map(|t| t.as_str())) {
            query.push(("type", kind.to_string()));
        }

        Ok(self
            .get("nearbysearch", &query)
            .await?
            .into_iter()
            .filter(|p| p.place_id != place.place_id)
            .collect())
    }
}
