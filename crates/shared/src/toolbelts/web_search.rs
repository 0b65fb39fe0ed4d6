// crates/shared/src/toolbelts/web_search.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use scraper::{Html, Selector};
use serde_json::{json, Map, Value};

use crate::register_toolbelt;

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS_CAP: u64 = 10;
const PAGE_CHAR_LIMIT: usize = 20_000;

pub struct WebSearch {
    api_key: String,
    default_max_results: u64,
    client: reqwest::Client,
}

impl WebSearch {
    pub fn new(api_key: impl Into<String>, default_max_results: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Switchboard/0.1")
            .timeout(Duration::from_secs(15))
            .build()
            .context("failed to build search client")?;

        Ok(Self {
            api_key: api_key.into(),
            default_max_results: default_max_results.clamp(1, MAX_RESULTS_CAP),
            client,
        })
    }
}

register_toolbelt! {
    WebSearch {
        description: "Search the web and fetch webpage content using the Tavily Search API",
        tools: {
            "search" => search {
                description: "Search the web for information. Returns titles, URLs, and content snippets. Use for general queries and current events.",
                params: [
                    "query": "string" => "Search query",
                    "max_results": "integer" => "Maximum number of results to return (max: 10)" (optional)
                ]
            },
            "fetch_page" => fetch_page {
                description: "Fetch a webpage and extract readable text content. Use after search to read full articles.",
                params: [
                    "url": "string" => "URL to fetch"
                ]
            }
        }
    }
}

impl WebSearch {
    async fn search(&self, args: &Map<String, Value>) -> Result<Value> {
        let query = args.get("query").and_then(Value::as_str).unwrap_or("").trim();
        if query.is_empty() {
            bail!("query cannot be empty");
        }

        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .unwrap_or(self.default_max_results)
            .clamp(1, MAX_RESULTS_CAP);

        tracing::debug!(query, max_results, "web search");

        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "query": query,
                "max_results": max_results,
                "search_depth": "basic",
            }))
            .send()
            .await
            .context("search request failed")?;

        if !response.status().is_success() {
            bail!("search failed: {}", response.status());
        }

        let data: Value = response.json().await.context("search response was not JSON")?;
        Ok(Value::String(format_results(query, &data, max_results as usize)))
    }

    async fn fetch_page(&self, args: &Map<String, Value>) -> Result<Value> {
        let url = args.get("url").and_then(Value::as_str).unwrap_or("");
        if url.is_empty() {
            bail!("url cannot be empty");
        }

        if !url.starts_with("http://") && !url.starts_with("https://") {
            bail!("URL must start with http:// or https://");
        }

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            bail!("failed to fetch page: {}", response.status());
        }

        // Skip binary content
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !content_type.contains("text/html") && !content_type.contains("text/plain") {
            return Ok(Value::String(format!("Skipping non-text content type: {}", content_type)));
        }

        let html = response.text().await?;
        let text = html_to_text(&html);

        Ok(Value::String(truncate_chars(text, PAGE_CHAR_LIMIT)))
    }
}

fn format_results(query: &str, data: &Value, max_results: usize) -> String {
    let mut output = format!("Search results for '{}':\n\n", query);

    if let Some(answer) = data["answer"].as_str().filter(|a| !a.is_empty()) {
        output.push_str(&format!("Summary: {}\n\n", answer));
    }

    match data["results"].as_array() {
        Some(results) if !results.is_empty() => {
            for (i, result) in results.iter().take(max_results).enumerate() {
                let title = result["title"].as_str().unwrap_or("No title");
                let url = result["url"].as_str().unwrap_or("");
                let content = result["content"].as_str().unwrap_or("");

                output.push_str(&format!("{}. {}\n", i + 1, title));
                output.push_str(&format!("   URL: {}\n", url));
                if !content.is_empty() {
                    output.push_str(&format!("   {}\n", content));
                }
                output.push('\n');
            }
        }
        _ => output.push_str("No results found.\n"),
    }

    output
}

fn truncate_chars(text: String, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text;
    }

    let kept: String = text.chars().take(limit).collect();
    format!("{}... [truncated at {} chars, full page is {} chars]", kept, limit, total)
}

fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text_parts = Vec::new();

    if let Ok(body_selector) = Selector::parse("body") {
        if let Some(body) = document.select(&body_selector).next() {
            extract_text(&body, &mut text_parts);
        }
    }

    let lines: Vec<&str> = text_parts
        .iter()
        .map(|s| s.trim())
        // symbol-only lines are separators and icons
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect();

    lines.join("\n")
}

fn extract_text(element: &scraper::ElementRef, parts: &mut Vec<String>) {
    let tag = element.value().name();

    if matches!(tag, "script" | "style" | "nav" | "footer" | "header" | "aside" | "noscript") {
        return;
    }

    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        } else if let Some(child_ref) = scraper::ElementRef::wrap(child) {
            extract_text(&child_ref, parts);
        }
    }
}
