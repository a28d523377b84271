//! Ollama client for link classification
//!
//! Two model calls per ingested link: content condensation and
//! category/keyword suggestion. Both are single-attempt with fixed timeouts;
//! on any failure the caller gets a deterministic fallback value, never an
//! error. The response parser (`classify`) handles the rest.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::settings;

/// Sentinel returned when the classification call fails. Flows forward as the
/// link's `raw_category` and sends the parser down its failure path.
pub const CLASSIFY_FAILED: &str = "Failed to connect to Ollama";

/// Ollama /api/generate request format
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

/// Ollama /api/generate response format
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Client for the Ollama REST API.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String, timeout_secs: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Build a client from the current settings.
    pub fn from_settings() -> Self {
        Self::new(
            settings::get_ollama_base_url(),
            settings::get_ollama_model(),
            settings::get_classify_timeout_secs(),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check whether the Ollama server answers on /api/tags (5s timeout).
    pub async fn probe(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let client = reqwest::Client::new();
        match client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// One completion call. Single attempt, fixed timeout, no retry.
    async fn generate(&self, prompt: String) -> Result<String, String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
        };

        let url = format!("{}/api/generate", self.base_url);
        let client = reqwest::Client::new();
        let response = client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Ollama error {}: {}", status, body));
        }

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        Ok(api_response.response)
    }

    /// Condense raw page content to its main meaningful part (≤500 chars).
    ///
    /// Only runs for content of 100+ chars; short input and any model failure
    /// both yield an empty string, and the caller falls back to raw content.
    pub async fn condense_content(&self, content: &str) -> String {
        if content.chars().count() < 100 {
            return String::new();
        }

        let excerpt = truncate_chars(content, 2000);
        let prompt = format!(
            "Extract the main meaningful content from this webpage text in at most \
             500 characters. Respond with the extracted text only, no preamble.\n\n{}",
            excerpt
        );

        match self.generate(prompt).await {
            Ok(text) => truncate_chars(text.trim(), 500).to_string(),
            Err(e) => {
                eprintln!("[Ollama] Condensation failed: {}", e);
                String::new()
            }
        }
    }

    /// Ask the model for a category and up to three keywords.
    ///
    /// Returns the raw free-text response; on failure, the [`CLASSIFY_FAILED`]
    /// sentinel instead. Never an error.
    pub async fn classify_link(&self, title: &str, excerpt: &str) -> String {
        let prompt = format!(
            "You are classifying a bookmarked webpage.\n\
             Title: {}\n\
             Content: {}\n\n\
             Suggest a single category for this page and up to three keywords \
             (each keyword at most two words).\n\
             Respond exactly in this format:\n\
             Category: <category> Keywords: <keyword1, keyword2, keyword3>",
            title, excerpt
        );

        match self.generate(prompt).await {
            Ok(text) => text,
            Err(e) => {
                eprintln!("[Ollama] Classification failed: {}", e);
                CLASSIFY_FAILED.to_string()
            }
        }
    }
}

/// Truncate to a character count without splitting a UTF-8 boundary.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
