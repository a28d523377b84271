//! Webpage content extraction
//!
//! Fetches a page and pulls out its title plus the text of headings and
//! paragraphs. Extraction never fails the pipeline: any network or parse
//! error produces a fallback record (title = URL, content = sentinel) and
//! ingestion continues.

use scraper::{Html, Selector};
use std::time::Duration;

use crate::ollama::truncate_chars;
use crate::settings;

/// Sentinel stored as `raw_content` when the page could not be fetched.
pub const FETCH_FAILED: &str = "Failed to extract content";

/// Raw content is capped at this many characters.
pub const MAX_CONTENT_CHARS: usize = 5000;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Title and plain text of one fetched page.
#[derive(Debug, Clone)]
pub struct PageContent {
    pub title: String,
    pub content: String,
    /// false means the fallback record: title is the URL, content the sentinel
    pub fetched: bool,
}

impl PageContent {
    fn fallback(url: &str) -> Self {
        PageContent {
            title: url.to_string(),
            content: FETCH_FAILED.to_string(),
            fetched: false,
        }
    }
}

/// Fetch a page and extract (title, plain text). 10s timeout, one attempt.
///
/// Returns the fallback record instead of an error on any failure; the
/// `fetched` tag tells callers which branch they got.
pub async fn fetch_page(url: &str) -> PageContent {
    let timeout = Duration::from_secs(settings::get_fetch_timeout_secs());

    let client = match reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[Extract] Failed to build HTTP client: {}", e);
            return PageContent::fallback(url);
        }
    };

    let body = match client.get(url).send().await {
        Ok(resp) => {
            if !resp.status().is_success() {
                eprintln!("[Extract] {} returned status {}", url, resp.status());
                return PageContent::fallback(url);
            }
            match resp.text().await {
                Ok(text) => text,
                Err(e) => {
                    eprintln!("[Extract] Failed to read body from {}: {}", url, e);
                    return PageContent::fallback(url);
                }
            }
        }
        Err(e) => {
            eprintln!("[Extract] Failed to fetch {}: {}", url, e);
            return PageContent::fallback(url);
        }
    };

    let (title, content) = parse_html(&body, url);
    PageContent {
        title,
        content,
        fetched: true,
    }
}

/// Pull the title and heading/paragraph text out of an HTML document.
///
/// Kept synchronous and separate from the fetch: `scraper::Html` is not Send,
/// so it must never be held across an await point.
fn parse_html(body: &str, url: &str) -> (String, String) {
    let document = Html::parse_document(body);

    let title_selector = Selector::parse("title").unwrap();
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| url.to_string());

    let text_selector = Selector::parse("h1, h2, h3, h4, h5, h6, p").unwrap();
    let mut content = String::new();
    for element in document.select(&text_selector) {
        for chunk in element.text() {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            if !content.is_empty() {
                content.push(' ');
            }
            content.push_str(chunk);
        }
    }

    (title, truncate_chars(&content, MAX_CONTENT_CHARS).to_string())
}
