//! Tests for the default service backends

use mockito::Matcher;
use seopilot_agent::services::{
    AuditRequest, AuditRunner, AuditStore, Channel, FileAuditStore, GooglePlacesProvider,
    InMemoryAuditStore, Lead, Notifier, PlacesProvider, ServiceError, TemplateAuditRunner,
    WebhookNotifier,
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn request(name: &str) -> AuditRequest {
    AuditRequest {
        business_name: name.to_string(),
        website: Some("https://joespizza.example".to_string()),
        location: Some("Brooklyn".to_string()),
        industry: Some("restaurant".to_string()),
        profile_id: None,
    }
}

#[tokio::test]
async fn test_file_store_round_trip() {
    let dir = TempDir::new().unwrap();
    let store = FileAuditStore::new(dir.path().join("audits"), dir.path().join("leads.json"));

    let id = store
        .save_audit(
            json!({"business_name": "Joe's Pizza", "score": 70, "location": "Brooklyn"}),
            Some("consultant-1"),
        )
        .await
        .unwrap();

    let audit = store.get_audit(&id).await.unwrap().unwrap();
    assert_eq!(audit["id"], id.as_str());
    assert_eq!(audit["owner_id"], "consultant-1");
    assert_eq!(audit["score"], 70);

    let leads = store.list_leads().await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].business_name, "Joe's Pizza");
    assert_eq!(leads[0].status, "audited");
    assert_eq!(leads[0].location.as_deref(), Some("Brooklyn"));

    // a second process sees the same data
    let reopened = FileAuditStore::new(dir.path().join("audits"), dir.path().join("leads.json"));
    assert!(reopened.get_audit(&id).await.unwrap().is_some());
    assert!(!dir.path().join("leads.json.tmp").exists());
}

#[tokio::test]
async fn test_file_store_missing_audit() {
    let dir = TempDir::new().unwrap();
    let store = FileAuditStore::new(dir.path().join("audits"), dir.path().join("leads.json"));
    assert!(store.get_audit("nope").await.unwrap().is_none());
    assert!(store.list_leads().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_file_store_upserts_leads_by_name() {
    let dir = TempDir::new().unwrap();
    let store = FileAuditStore::new(dir.path().join("audits"), dir.path().join("leads.json"));

    store
        .save_lead(Lead {
            id: "l1".to_string(),
            business_name: "Smile Dental".to_string(),
            location: Some("Austin".to_string()),
            industry: Some("dentist".to_string()),
            website: None,
            status: "new".to_string(),
            created_at: None,
        })
        .await
        .unwrap();
    store
        .save_audit(
            json!({"business_name": "smile dental", "website": "https://smile.example"}),
            None,
        )
        .await
        .unwrap();

    let leads = store.list_leads().await.unwrap();
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].status, "audited");
    assert_eq!(leads[0].website.as_deref(), Some("https://smile.example"));
    assert_eq!(leads[0].location.as_deref(), Some("Austin"));
}

#[tokio::test]
async fn test_in_memory_store() {
    let store = InMemoryAuditStore::new();
    let id = store
        .save_audit(json!({"id": "fixed", "business_name": "Acme"}), None)
        .await
        .unwrap();
    assert_eq!(id, "fixed");
    assert!(store.get_audit("fixed").await.unwrap().is_some());
    assert_eq!(store.list_leads().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_simulated_notifier() {
    let notifier = WebhookNotifier::simulated();
    assert!(!notifier.is_configured());

    let delivery = notifier
        .send(Channel::Email, "owner@joespizza.example", "https://r.example/1")
        .await
        .unwrap();
    assert!(delivery.ok);
    assert!(delivery.simulated);
    assert_eq!(delivery.channel, Channel::Email);
}

#[tokio::test]
async fn test_webhook_notifier_posts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/notify")
        .match_header("authorization", "Bearer hook-key")
        .match_body(Matcher::Json(json!({
            "channel": "sms",
            "target": "+15555550100",
            "link": "https://r.example/2"
        })))
        .with_status(202)
        .create_async()
        .await;

    let notifier = WebhookNotifier::new(format!("{}/notify", server.url()), "hook-key");
    let delivery = notifier
        .send(Channel::Sms, "+15555550100", "https://r.example/2")
        .await
        .unwrap();

    mock.assert_async().await;
    assert!(delivery.ok);
    assert!(!delivery.simulated);
}

#[tokio::test]
async fn test_webhook_notifier_upstream_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/notify")
        .with_status(400)
        .with_body(r#"{"error": {"message": "invalid phone number"}}"#)
        .create_async()
        .await;

    let notifier = WebhookNotifier::new(format!("{}/notify", server.url()), "");
    let err = notifier
        .send(Channel::Sms, "123", "https://r.example/3")
        .await
        .unwrap_err();

    match err {
        ServiceError::Upstream { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "invalid phone number");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

async fn places_server() -> mockito::ServerGuard {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/textsearch/json")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "Joe's Pizza Brooklyn".into()),
            Matcher::UrlEncoded("key".into(), "places-key".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "status": "OK",
                "results": [{
                    "place_id": "joe",
                    "name": "Joe's Pizza",
                    "formatted_address": "1 Court St, Brooklyn",
                    "rating": 4.2,
                    "user_ratings_total": 40,
                    "types": ["restaurant"],
                    "geometry": {"location": {"lat": 40.69, "lng": -73.99}}
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/nearbysearch/json")
        .match_query(Matcher::UrlEncoded("type".into(), "restaurant".into()))
        .with_status(200)
        .with_body(
            json!({
                "status": "OK",
                "results": [
                    {"place_id": "joe", "name": "Joe's Pizza", "rating": 4.2},
                    {"place_id": "a", "name": "Luigi's", "rating": 4.8},
                    {"place_id": "b", "name": "Slice House", "rating": 3.9}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
}

#[tokio::test]
async fn test_places_lookup() {
    let server = places_server().await;
    let places = GooglePlacesProvider::new("places-key", Some(server.url()));

    let place = places
        .find_business("Joe's Pizza", Some("Brooklyn"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(place.place_id, "joe");
    assert_eq!(place.review_count, Some(40));
    assert_eq!(place.address.as_deref(), Some("1 Court St, Brooklyn"));

    let competitors = places.find_competitors(&place, None, 5000).await.unwrap();
    let names: Vec<&str> = competitors.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Luigi's", "Slice House"]);
}

#[tokio::test]
async fn test_places_denied_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/textsearch/json")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#)
        .create_async()
        .await;

    let places = GooglePlacesProvider::new("bad", Some(server.url()));
    let err = places.find_business("Acme", None).await.unwrap_err();
    assert!(err.to_string().contains("The provided API key is invalid."));
}

#[tokio::test]
async fn test_template_audit_without_places() {
    let runner = TemplateAuditRunner::new(None);
    let audit = runner.run_full_audit(&request("Joe's Pizza")).await.unwrap();

    assert_eq!(audit["business_name"], "Joe's Pizza");
    let checks = audit["checks"].as_array().unwrap();
    let names: Vec<&str> = checks.iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["website", "business_listing", "nap_consistency"]);
    // pass + warn + warn
    assert_eq!(audit["score"], 67);
    assert!(audit.get("market_position").is_none());
    assert!(audit["summary"].as_str().unwrap().contains("67/100"));
}

#[tokio::test]
async fn test_template_audit_with_places() {
    let server = places_server().await;
    let places: Arc<dyn PlacesProvider> =
        Arc::new(GooglePlacesProvider::new("places-key", Some(server.url())));
    let runner = TemplateAuditRunner::new(Some(places));

    let audit = runner.run_full_audit(&request("Joe's Pizza")).await.unwrap();

    let checks = audit["checks"].as_array().unwrap();
    assert_eq!(checks.len(), 5);
    assert_eq!(audit["place"]["place_id"], "joe");
    assert_eq!(audit["market_position"]["competitor_count"], 2);
    assert_eq!(audit["market_position"]["rating_rank"], 2);
}

#[tokio::test]
async fn test_template_audit_degrades_when_places_fail() {
    let server = mockito::Server::new_async().await;
    // no mocks: every lookup answers 501
    let places: Arc<dyn PlacesProvider> =
        Arc::new(GooglePlacesProvider::new("k", Some(server.url())));
    let runner = TemplateAuditRunner::new(Some(places));

    let audit = runner.run_full_audit(&request("Joe's Pizza")).await.unwrap();
    assert!(audit.get("place").is_none());
    assert_eq!(audit["checks"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_template_audit_requires_name() {
    let runner = TemplateAuditRunner::new(None);
    let result = runner.run_full_audit(&request("  ")).await;
    assert!(matches!(result, Err(ServiceError::Invalid(_))));
}
