//! Tests for the website fetcher and its address policy

use async_trait::async_trait;
use seopilot_agent::tools::{AddressPolicy, FetchWebsiteTool, HostLookup, ToolError, ToolTrait};
use serde_json::json;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const PAGE: &str = r#"<!doctype html>
<html>
<head>
  <title>Joe's Pizza | Brooklyn</title>
  <meta name="description" content="Wood-fired pizza in   Brooklyn since 1989.">
</head>
<body>
  <h1>Joe's Pizza</h1>
  <h2>Menu</h2>
  <p>Order online or visit us on Court Street.</p>
</body>
</html>"#;

fn tool(policy: AddressPolicy) -> FetchWebsiteTool {
    FetchWebsiteTool::new(policy, Duration::from_secs(5), 2_000).unwrap()
}

/// Answers each lookup with the next address set, repeating the last one
struct ScriptedLookup {
    answers: Vec<Vec<IpAddr>>,
    calls: AtomicUsize,
}

impl ScriptedLookup {
    fn new(answers: &[&[&str]]) -> Arc<Self> {
        Arc::new(Self {
            answers: answers
                .iter()
                .map(|set| set.iter().map(|a| a.parse().unwrap()).collect())
                .collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostLookup for ScriptedLookup {
    async fn lookup(&self, _host: &str) -> std::io::Result<Vec<IpAddr>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.answers[n.min(self.answers.len() - 1)].clone())
    }
}

fn port_of(server: &mockito::Server) -> String {
    server.host_with_port().rsplit(':').next().unwrap().to_string()
}

fn error_text(result: Result<serde_json::Value, ToolError>) -> String {
    match result {
        Err(e) => e.to_string(),
        Ok(v) => panic!("expected an error, got {}", v),
    }
}

#[tokio::test]
async fn test_fetch_html_page() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(PAGE)
        .create_async()
        .await;

    let result = tool(AddressPolicy::permissive())
        .execute(json!({ "url": server.url() }))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result["status"], 200);
    assert_eq!(result["title"], "Joe's Pizza | Brooklyn");
    assert_eq!(result["meta_description"], "Wood-fired pizza in Brooklyn since 1989.");
    assert_eq!(result["headings"], json!(["h1: Joe's Pizza", "h2: Menu"]));
    assert!(result["text"].as_str().unwrap().contains("Court Street"));
    assert_eq!(result["truncated"], false);
}

#[tokio::test]
async fn test_long_page_truncated() {
    let mut server = mockito::Server::new_async().await;
    let body = format!("<html><body><p>{}</p></body></html>", "word ".repeat(2_000));
    server
        .mock("GET", "/long")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(body)
        .create_async()
        .await;

    let result = tool(AddressPolicy::permissive())
        .execute(json!({ "url": format!("{}/long", server.url()) }))
        .await
        .unwrap();

    assert_eq!(result["truncated"], true);
    assert!(result["text"].as_str().unwrap().chars().count() <= 2_000);
}

#[tokio::test]
async fn test_non_html_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/data.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"a":1}"#)
        .create_async()
        .await;

    let message = error_text(
        tool(AddressPolicy::permissive())
            .execute(json!({ "url": format!("{}/data.json", server.url()) }))
            .await,
    );
    assert!(message.contains("Unsupported content type"));
}

#[tokio::test]
async fn test_http_error_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .create_async()
        .await;

    let message = error_text(
        tool(AddressPolicy::permissive())
            .execute(json!({ "url": format!("{}/missing", server.url()) }))
            .await,
    );
    assert!(message.contains("404"));
}

#[tokio::test]
async fn test_relative_redirect_followed() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/old")
        .with_status(301)
        .with_header("location", "/new")
        .create_async()
        .await;
    server
        .mock("GET", "/new")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(PAGE)
        .create_async()
        .await;

    let result = tool(AddressPolicy::permissive())
        .execute(json!({ "url": format!("{}/old", server.url()) }))
        .await
        .unwrap();

    assert!(result["url"].as_str().unwrap().ends_with("/new"));
    assert_eq!(result["title"], "Joe's Pizza | Brooklyn");
}

#[tokio::test]
async fn test_redirect_to_blocked_host_refused() {
    let mut server = mockito::Server::new_async().await;
    let host_with_port = server.host_with_port();
    let port = host_with_port.rsplit(':').next().unwrap();
    server
        .mock("GET", "/go")
        .with_status(302)
        .with_header("location", &format!("http://localhost:{}/secret", port))
        .create_async()
        .await;
    let secret = server
        .mock("GET", "/secret")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<p>secret</p>")
        .expect(0)
        .create_async()
        .await;

    // the mock server address itself is allowed, the host name is not
    let policy = AddressPolicy::new(Vec::new(), Vec::new(), vec!["localhost".to_string()]);
    let message = error_text(
        tool(policy)
            .execute(json!({ "url": format!("{}/go", server.url()) }))
            .await,
    );

    assert!(message.contains("Refusing to fetch localhost"));
    secret.assert_async().await;
}

#[tokio::test]
async fn test_default_policy_blocks_local_targets() {
    let tool = tool(AddressPolicy::default());
    for url in [
        "http://127.0.0.1/",
        "http://localhost:8080/admin",
        "http://169.254.169.254/latest/meta-data",
        "http://[::1]/",
        "http://192.168.0.1/",
    ] {
        let message = error_text(tool.execute(json!({ "url": url })).await);
        assert!(message.contains("Refusing to fetch"), "{}: {}", url, message);
    }
}

#[tokio::test]
async fn test_scheme_and_parse_errors() {
    let policy = AddressPolicy::default();

    let err = policy.check_url("ftp://example.com/file").await.unwrap_err();
    assert!(err.to_string().contains("Unsupported URL scheme 'ftp'"));

    let err = policy.check_url("not a url").await.unwrap_err();
    assert!(err.to_string().contains("Invalid URL"));

    let err = policy.check_url("file:///etc/passwd").await.unwrap_err();
    assert!(err.to_string().contains("Unsupported URL scheme"));
}

#[tokio::test]
async fn test_public_ip_literal_passes_without_lookup() {
    let url = AddressPolicy::default()
        .check_url("https://93.184.216.34/page")
        .await
        .unwrap();
    assert_eq!(url.host_str(), Some("93.184.216.34"));
}

#[tokio::test]
async fn test_missing_url_parameter() {
    let tool = tool(AddressPolicy::default());
    let result = tool.execute(json!({ "url": "   " })).await;
    assert!(matches!(result, Err(ToolError::Execution(_))));
}

#[tokio::test]
async fn test_client_connects_through_policy_lookup() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(PAGE)
        .create_async()
        .await;

    let lookup = ScriptedLookup::new(&[&["127.0.0.1"]]);
    let policy = AddressPolicy::permissive().with_lookup(lookup.clone());
    let result = tool(policy)
        .execute(json!({ "url": format!("http://joes-pizza.test:{}/", port_of(&server)) }))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(result["title"], "Joe's Pizza | Brooklyn");
    assert!(lookup.calls() >= 2);
}

#[tokio::test]
async fn test_rebinding_to_loopback_refused() {
    let mut server = mockito::Server::new_async().await;
    let secret = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body("<p>secret</p>")
        .expect(0)
        .create_async()
        .await;

    // public on the first lookup, loopback on every later one
    let lookup = ScriptedLookup::new(&[&["93.184.216.34"], &["127.0.0.1"]]);
    let policy = AddressPolicy::default().with_lookup(lookup.clone());
    let message = error_text(
        tool(policy)
            .execute(json!({ "url": format!("http://rebind.test:{}/", port_of(&server)) }))
            .await,
    );

    assert!(message.contains("rebind.test"), "{}", message);
    assert!(lookup.calls() >= 2);
    secret.assert_async().await;
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let tool = FetchWebsiteTool::new(AddressPolicy::permissive(), Duration::from_secs(1), 2_000)
        .unwrap();
    let started = std::time::Instant::now();
    let message = error_text(tool.execute(json!({ "url": format!("http://{}/", addr) })).await);

    assert!(message.contains("Timed out fetching"), "{}", message);
    assert!(started.elapsed() < Duration::from_secs(4));
    server.abort();
}
