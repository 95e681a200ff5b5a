//! Web search backed by the Brave results page.
//!
//! The flow is: fetch the results page, pull result links out of the HTML,
//! fetch pages in order until enough have loaded, and reduce each page to
//! markdown-ish text. Every failure degrades to fewer (or zero) documents.

use crate::capability::{SearchBackend, wrap_document};
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use std::sync::LazyLock;
use std::time::Duration;

/// Results page queried for links
pub const DEFAULT_SEARCH_URL: &str = "https://search.brave.com/search";

/// Browser-like user agent; the results page rejects obvious bots
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<div\s+class="[^"]*"\s+data-pos="\d+"\s+data-type="web".*?>\s*<a\s+[^>]*href="([^"]*)""#,
    )
    .expect("BUG: result link pattern is valid")
});

static NOISE_ELEMENTS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    ["head", "footer", "style", "script", "header", "nav", "navbar"]
        .iter()
        .map(|tag| {
            Regex::new(&format!(r"(?is)<{tag}\b[^>]*>.*?</{tag}\s*>"))
                .expect("BUG: noise element pattern is valid")
        })
        .collect()
});

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<h([1-6])\b[^>]*>(.*?)</h[1-6]\s*>").expect("BUG: heading pattern is valid")
});

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*href="([^"]*)"[^>]*>(.*?)</a\s*>"#)
        .expect("BUG: anchor pattern is valid")
});

static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<li\b[^>]*>").expect("BUG: list item pattern is valid"));

static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</?(p|div|section|article|tr|ul|ol|table|blockquote)\b[^>]*>")
        .expect("BUG: block break pattern is valid")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("BUG: tag pattern is valid"));

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("BUG: whitespace pattern is valid"));

static DASH_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-{4,}").expect("BUG: dash pattern is valid"));

/// Extracts result links from a results page, in page order.
///
/// Brave News and Wikipedia links are skipped.
pub fn extract_result_links(html: &str) -> Vec<String> {
    RESULT_LINK
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|href| decode_entities(href.as_str()))
        .filter(|href| {
            !href.starts_with("https://brave.com/brave-news") && !href.contains("wikipedia.org")
        })
        .filter_map(|href| Url::parse(&href).ok())
        .map(String::from)
        .collect()
}

/// Reduces an HTML page to markdown-flavoured text.
pub fn html_to_markdown(html: &str) -> String {
    let mut text = html.to_string();
    for element in NOISE_ELEMENTS.iter() {
        text = element.replace_all(&text, "").into_owned();
    }

    text = HEADING
        .replace_all(&text, |caps: &regex::Captures<'_>| {
            let level = caps[1].parse::<usize>().unwrap_or(1);
            format!("\n\n{} {}\n\n", "#".repeat(level), caps[2].trim())
        })
        .into_owned();
    text = ANCHOR.replace_all(&text, "[$2]($1)").into_owned();
    text = LIST_ITEM.replace_all(&text, "\n- ").into_owned();
    text = BLOCK_BREAK.replace_all(&text, "\n").into_owned();
    text = TAG.replace_all(&text, "").into_owned();
    text = decode_entities(&text);
    text = WHITESPACE_RUN.replace_all(&text, "\n").into_owned();
    text = DASH_RUN.replace_all(&text, "").into_owned();

    text.trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

/// [`SearchBackend`] that scrapes a search results page.
#[derive(Debug, Clone)]
pub struct WebSearch {
    client: reqwest::Client,
    search_url: String,
    max_pages: usize,
}

impl WebSearch {
    /// Creates a backend with the default results page and a one page limit.
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            max_pages: 1,
        })
    }

    /// Points the backend at another results page (same markup expected).
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    /// How many pages to fetch per query, at least one.
    pub fn with_max_pages(mut self, pages: usize) -> Self {
        self.max_pages = pages.max(1);
        self
    }

    async fn result_links(&self, query: &str) -> Result<Vec<String>> {
        let html = self
            .client
            .get(&self.search_url)
            .query(&[("q", query)])
            .send()
            .await?
            .text()
            .await?;

        let links = extract_result_links(&html);
        if links.is_empty() {
            return Err(Error::other(format!("No search results found for {:?}", query)));
        }
        Ok(links)
    }

    async fn fetch_page(&self, link: &str) -> Result<Option<String>> {
        let response = self.client.get(link).send().await?;
        if !response.status().is_success() {
            log::debug!("skipping {} ({})", link, response.status());
            return Ok(None);
        }

        let html = response.text().await?;
        Ok(Some(wrap_document(link, &html_to_markdown(&html))))
    }
}

#[async_trait]
impl SearchBackend for WebSearch {
    async fn search(&self, query: &str) -> Vec<String> {
        let links = match self.result_links(query).await {
            Ok(links) => links,
            Err(e) => {
                log::warn!("web search failed: {}", e);
                return Vec::new();
            }
        };

        let mut pages = Vec::new();
        for link in links {
            if pages.len() == self.max_pages {
                break;
            }

            match self.fetch_page(&link).await {
                Ok(Some(page)) => pages.push(page),
                Ok(None) => {}
                Err(e) => log::warn!("Failed to fetch {}: {}", link, e),
            }
        }

        pages
    }
}
