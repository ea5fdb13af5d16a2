use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{SearchResult, WebSearch};

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Web search against DuckDuckGo's no-JS HTML endpoint
#[derive(Clone)]
pub struct DuckDuckGoSearch {
    client: reqwest::Client,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebSearch for DuckDuckGoSearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>> {
        let url = format!("{}?q={}", DUCKDUCKGO_HTML_URL, urlencoding::encode(query));
        info!("Executing DuckDuckGo search for: {}", query);

        let response = self.client.get(&url).send().await?;
        info!("Received response status: {}", response.status());

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(anyhow!("DuckDuckGo search failed: {}", error_text));
        }

        let body = response.text().await?;
        let results = parse_results(&body, max_results)?;
        info!("Parsed {} search results", results.len());
        Ok(results)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {:?}", css, e))
}

/// Extract organic results from a DuckDuckGo HTML results page
pub fn parse_results(html: &str, max_results: usize) -> Result<Vec<SearchResult>> {
    let document = Html::parse_document(html);
    let result_selector = selector("div.result")?;
    let title_selector = selector("a.result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let mut results = Vec::new();
    for block in document.select(&result_selector) {
        if results.len() >= max_results {
            break;
        }
        if block.value().classes().any(|c| c == "result--ad") {
            debug!("Skipping sponsored result");
            continue;
        }

        let Some(anchor) = block.select(&title_selector).next() else {
            continue;
        };
        let title = element_text(anchor);
        if title.is_empty() {
            continue;
        }
        let url = anchor
            .value()
            .attr("href")
            .map(resolve_link)
            .unwrap_or_default();
        let snippet = block
            .select(&snippet_selector)
            .next()
            .map(element_text)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "No description available".to_string());

        results.push(SearchResult::new(title, url, snippet));
    }

    if results.is_empty() {
        warn!("No search results found in response");
    }
    Ok(results)
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result links go through a `/l/?uddg=<target>` redirect; return the target.
fn resolve_link(href: &str) -> String {
    if let Some(start) = href.find("uddg=") {
        let encoded = &href[start + "uddg=".len()..];
        let encoded = encoded.split('&').next().unwrap_or(encoded);
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    href.to_string()
}
