//! Website fetch tool

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Serialize;
use serde_json::{json, Value};
use std::error::Error as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::url_guard::AddressPolicy;
use super::{required_str, ToolError, ToolResult, ToolTrait};

const USER_AGENT: &str = "Mozilla/5.0 (compatible; SEOPilot/0.1; +https://github.com/seopilot/seopilot)";
const MAX_REDIRECTS: usize = 3;
const MAX_HEADINGS: usize = 20;
const TEXT_WIDTH: usize = 100;

/// Readable summary of an HTML page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub headings: Vec<String>,
    pub text: String,
    pub truncated: bool,
}

/// Fetches a public HTML page and extracts what an SEO review needs.
///
/// Every hop, redirects included, goes through the [`AddressPolicy`], which
/// also resolves the host names the client connects to.
pub struct FetchWebsiteTool {
    client: Client,
    policy: AddressPolicy,
    timeout: Duration,
    max_chars: usize,
}

impl FetchWebsiteTool {
    pub fn new(policy: AddressPolicy, timeout: Duration, max_chars: usize) -> Result<Self, ToolError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .dns_resolver(Arc::new(policy.clone()))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ToolError::execution(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            policy,
            timeout,
            max_chars,
        })
    }

    async fn fetch(&self, raw_url: &str) -> Result<(reqwest::Url, u16, String), ToolError> {
        let mut url = self.policy.check_url(raw_url).await?;

        for _ in 0..=MAX_REDIRECTS {
            debug!("Fetching {}", url);
            let response = self
                .client
                .get(url.clone())
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        ToolError::execution(format!("Timed out fetching {}", url))
                    } else {
                        ToolError::execution(format!("Request to {} failed: {}", url, error_chain(&e)))
                    }
                })?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| ToolError::execution(format!("{} redirected without a location", url)))?;
                let next = url
                    .join(location)
                    .map_err(|e| ToolError::execution(format!("Bad redirect target: {}", e)))?;
                url = self.policy.check_url(next.as_str()).await?;
                continue;
            }

            if !status.is_success() {
                return Err(ToolError::execution(format!("{} returned HTTP {}", url, status)));
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_lowercase();
            if !is_html(&content_type) {
                return Err(ToolError::execution(format!(
                    "Unsupported content type '{}', only HTML pages can be fetched",
                    content_type
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| ToolError::execution(format!("Failed to read {}: {}", url, e)))?;
            return Ok((url, status.as_u16(), body));
        }

        Err(ToolError::execution(format!("Too many redirects fetching {}", raw_url)))
    }
}

/// `e` followed by its sources
fn error_chain(e: &reqwest::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn is_html(content_type: &str) -> bool {
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

fn selector(css: &str) -> Result<Selector, ToolError> {
    Selector::parse(css).map_err(|e| ToolError::execution(format!("Bad selector {}: {}", css, e)))
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title, meta description, headings and readable text of `html`
pub fn summarize_page(html: &str, max_chars: usize) -> Result<PageSummary, ToolError> {
    let document = Html::parse_document(html);

    let title = document
        .select(&selector("title")?)
        .next()
        .map(|t| collapse(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let meta_description = document
        .select(&selector(r#"meta[name="description"]"#)?)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(collapse)
        .filter(|d| !d.is_empty());

    let headings = document
        .select(&selector("h1, h2, h3")?)
        .map(|h| format!("{}: {}", h.value().name(), collapse(&h.text().collect::<String>())))
        .filter(|h| !h.ends_with(": "))
        .take(MAX_HEADINGS)
        .collect();

    let full_text = html2text::from_read(html.as_bytes(), TEXT_WIDTH);
    let truncated = full_text.chars().count() > max_chars;
    let text = if truncated {
        full_text.chars().take(max_chars).collect()
    } else {
        full_text
    };

    Ok(PageSummary {
        title,
        meta_description,
        headings,
        text: text.trim().to_string(),
        truncated,
    })
}

#[async_trait]
impl ToolTrait for FetchWebsiteTool {
    fn name(&self) -> &str {
        "fetch_website"
    }

    fn description(&self) -> &str {
        "Fetch a public web page and return its title, meta description, headings and readable text."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "Absolute http(s) URL" }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        let raw_url = required_str(&args, "url")?;
        let (url, status, body) = self.fetch(&raw_url).await?;
        let page = summarize_page(&body, self.max_chars)?;

        Ok(json!({
            "url": url.as_str(),
            "status": status,
            "title": page.title,
            "meta_description": page.meta_description,
            "headings": page.headings,
            "text": page.text,
            "truncated": page.truncated,
        }))
    }
}
