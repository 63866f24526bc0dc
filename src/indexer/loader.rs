use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{redirect, Client, Url};
use scraper::{ElementRef, Html, Selector};

use crate::error::RagError;
use crate::models::{Metadata, RawDocument};

pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECTS: usize = 10;

const BROWSER_HEADERS: [(&str, &str); 9] = [
    ("user-agent", "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"),
    ("accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    ("accept-language", "en-US,en;q=0.9"),
    ("connection", "keep-alive"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("cache-control", "max-age=0"),
];

/// Elements whose text is never visible.
const SKIPPED_TAGS: [&str; 7] = ["script", "style", "noscript", "template", "svg", "head", "iframe"];

const BLOCK_TAGS: [&str; 26] = [
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav", "p",
    "pre", "section", "tr",
];

static HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").unwrap());
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static HTML_ROOT: Lazy<Selector> = Lazy::new(|| Selector::parse("html").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Fetches a URL and returns its textual content.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Vec<RawDocument>, RagError>;
}

/// Checks that `url` is an absolute http(s) URL.
pub fn validate_url(url: &str) -> Result<Url, RagError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(RagError::InvalidInput("URL cannot be empty".to_string()));
    }
    if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
        return Err(RagError::InvalidInput(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    let parsed = Url::parse(trimmed)
        .map_err(|e| RagError::InvalidInput(format!("URL is not valid: {}", e)))?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(RagError::InvalidInput("URL has no host".to_string()));
    }
    Ok(parsed)
}

/// HTTP loader with a browser-like header set.
pub struct WebLoader {
    client: Client,
}

impl WebLoader {
    pub fn new() -> Result<Self, RagError> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, RagError> {
        let mut headers = HeaderMap::new();
        for (name, value) in BROWSER_HEADERS {
            headers.insert(name, HeaderValue::from_static(value));
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .redirect(redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| RagError::ContentExtraction(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentLoader for WebLoader {
    async fn load(&self, url: &str) -> Result<Vec<RawDocument>, RagError> {
        let parsed = validate_url(url)?;
        tracing::info!("Fetching {}", parsed);

        let response = self.client.get(parsed.clone()).send().await.map_err(|e| {
            tracing::warn!("Fetch of {} failed: {}", parsed, e);
            RagError::ContentExtraction(format!(
                "Could not fetch {}. The site may be unreachable or blocking scrapers.",
                parsed
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("Fetch of {} returned {}", parsed, status);
            return Err(RagError::ContentExtraction(format!(
                "{} responded with status {}. The site may be blocking scrapers or the URL may be invalid.",
                parsed,
                status.as_u16()
            )));
        }

        let is_html = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |ct| ct.contains("html") || ct.contains("xml"));

        let body = response.text().await.map_err(|e| {
            tracing::warn!("Reading body of {} failed: {}", parsed, e);
            RagError::ContentExtraction(format!("Could not read the response from {}.", parsed))
        })?;

        let mut document = if is_html {
            extract_document(&body)
        } else {
            RawDocument {
                content: normalize_whitespace(&body),
                metadata: Metadata::new(),
            }
        };
        document.metadata.insert("source".to_string(), url.trim().to_string());
        document
            .metadata
            .insert("fetched_at".to_string(), Utc::now().to_rfc3339());

        if document.content.is_empty() {
            return Err(RagError::ContentExtraction(format!(
                "No content could be extracted from {}. The site may be blocking scrapers or the URL may be invalid.",
                parsed
            )));
        }

        tracing::info!(
            "Extracted {} characters from {}",
            document.content.chars().count(),
            parsed
        );
        Ok(vec![document])
    }
}

/// Visible text plus title, description and language metadata from an HTML page.
pub fn extract_document(html: &str) -> RawDocument {
    let page = Html::parse_document(html);
    let mut metadata = Metadata::new();

    if let Some(title) = page.select(&TITLE).next() {
        let title = single_line(&title.text().collect::<String>());
        if !title.is_empty() {
            metadata.insert("title".to_string(), title);
        }
    }
    if let Some(description) = page
        .select(&DESCRIPTION)
        .next()
        .and_then(|m| m.value().attr("content"))
    {
        let description = single_line(description);
        if !description.is_empty() {
            metadata.insert("description".to_string(), description);
        }
    }
    if let Some(lang) = page
        .select(&HTML_ROOT)
        .next()
        .and_then(|root| root.value().attr("lang"))
    {
        metadata.insert("language".to_string(), lang.to_string());
    }

    let mut text = String::new();
    match page.select(&BODY).next() {
        Some(body) => collect_visible_text(body, &mut text),
        None => collect_visible_text(page.root_element(), &mut text),
    }

    RawDocument {
        content: normalize_whitespace(&text),
        metadata,
    }
}

fn collect_visible_text(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }
    let is_block = BLOCK_TAGS.contains(&name);
    if is_block {
        out.push('\n');
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_visible_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }

    if is_block {
        out.push('\n');
    }
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses horizontal whitespace, trims lines and squeezes blank-line runs.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = HORIZONTAL_WS.replace_all(text, " ");
    let lines: Vec<&str> = collapsed.lines().map(str::trim).collect();
    BLANK_LINES
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}
