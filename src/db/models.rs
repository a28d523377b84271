use serde::{Deserialize, Serialize};

/// A stored link with everything the pipeline derived for it.
///
/// `url` is the canonical URL and the primary key; it is canonicalized before
/// any lookup or write. Curated fields are written once at creation and never
/// silently overwritten (re-ingestion of the same URL is a duplicate skip).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub title: String,
    /// Verbatim model response text
    #[serde(rename = "rawCategory")]
    pub raw_category: String,
    /// Category phrase extracted from the response
    #[serde(rename = "suggestedCategory")]
    pub suggested_category: String,
    /// Extracted page text (≤5000 chars)
    #[serde(rename = "rawContent")]
    pub raw_content: String,
    /// Model-condensed content (≤500 chars, may be empty)
    #[serde(rename = "cleanedContent")]
    pub cleaned_content: String,
    /// Comma-joined keyword list; the literal "none" when empty
    pub keywords: String,
    #[serde(rename = "categoryExplanation")]
    pub category_explanation: String,
    #[serde(rename = "keywordExplanation")]
    pub keyword_explanation: String,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// A link joined with its category, for listing surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary {
    pub url: String,
    pub title: String,
    pub category: String,
}
