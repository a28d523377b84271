// =============================================================================
// Classification Response Parser
// =============================================================================
//
// Turns the free-text model response into a structured
// (category, suggested category, keywords) triple:
// - category: first catalog entry matched, in catalog order
// - suggested_category: the phrase the model wrote after "Category:"
// - keywords: up to 3, from the "Keywords:" clause or a capitalized-phrase scan
//
// Parsing uses fixed regexes, not AI, so identical input always yields
// identical output.

use regex::Regex;
use std::sync::OnceLock;

use crate::ollama::CLASSIFY_FAILED;

/// Default for both category fields when nothing resolves.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Keyword sentinel meaning "no keywords extracted".
pub const KEYWORD_NONE: &str = "none";

/// Ordered catalog of recognized category names. Order is the tie-break when a
/// response matches more than one entry. `Uncategorized` is not an entry
/// here: it is the default when nothing matches.
pub const DEFAULT_CATALOG: &[&str] = &[
    "Technology",
    "Programming",
    "Database",
    "Artificial Intelligence",
    "Science",
    "Health",
    "Finance",
    "Business",
    "Education",
    "News",
    "Sports",
    "Entertainment",
    "Music",
    "Travel",
    "Food",
    "Gaming",
    "Social Media",
    "Shopping",
];

/// Structured result of parsing one model response.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub category: String,
    pub suggested_category: String,
    pub keywords: Vec<String>,
}

impl Classification {
    fn uncategorized() -> Self {
        Classification {
            category: UNCATEGORIZED.to_string(),
            suggested_category: UNCATEGORIZED.to_string(),
            keywords: vec![KEYWORD_NONE.to_string()],
        }
    }
}

fn category_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Category:\s*([A-Za-z\s/]+?)\s*(?:Keywords:|$)").unwrap())
}

fn keywords_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Keywords:\s*([^.]*)").unwrap())
}

fn capitalized_phrase_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Runs of capitalized words; single letters like "I" don't qualify.
    RE.get_or_init(|| Regex::new(r"\b[A-Z][a-zA-Z-]+(?:\s+[A-Z][a-zA-Z-]+)*\b").unwrap())
}

/// Parse a model response into a category/keywords triple.
///
/// The empty response, and the connection-failure sentinel the orchestrator
/// substitutes when Ollama is unreachable, both take the failure path straight
/// to `("Uncategorized", "Uncategorized", ["none"])`.
pub fn parse_classification(response: &str, catalog: &[String]) -> Classification {
    let response = response.trim();
    if response.is_empty() || response == CLASSIFY_FAILED {
        return Classification::uncategorized();
    }

    // "Category: <phrase>" up to the Keywords clause or end of text.
    let suggested_category = category_regex()
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNCATEGORIZED.to_string());

    let category = resolve_category(response, &suggested_category, catalog);

    let mut keywords = extract_keyword_clause(response);
    if keywords.is_empty() || (keywords.len() == 1 && keywords[0].eq_ignore_ascii_case(KEYWORD_NONE)) {
        keywords = capitalized_phrase_fallback(response, &category, &suggested_category);
    }
    if keywords.is_empty() {
        keywords = vec![KEYWORD_NONE.to_string()];
    }

    Classification {
        category,
        suggested_category,
        keywords,
    }
}

/// Resolve the final category against the catalog, in catalog order.
///
/// The first entry that either equals the suggested category
/// (case-insensitive) or appears anywhere in the response text wins; no
/// scoring, catalog order is the total tie-break.
pub fn resolve_category(response: &str, suggested: &str, catalog: &[String]) -> String {
    let response_lower = response.to_lowercase();
    for entry in catalog {
        if entry.eq_ignore_ascii_case(suggested)
            || response_lower.contains(&entry.to_lowercase())
        {
            return entry.clone();
        }
    }
    UNCATEGORIZED.to_string()
}

/// Pull keywords out of a "Keywords: a, b, c." clause (up to the next period).
fn extract_keyword_clause(response: &str) -> Vec<String> {
    let Some(captures) = keywords_regex().captures(response) else {
        return Vec::new();
    };
    let clause = captures.get(1).map(|m| m.as_str()).unwrap_or("");
    clause
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .take(3)
        .collect()
}

/// Fallback keyword scan: capitalized phrases of at most two words, excluding
/// anything already covered by the category names.
fn capitalized_phrase_fallback(response: &str, category: &str, suggested: &str) -> Vec<String> {
    let category_lower = category.to_lowercase();
    let suggested_lower = suggested.to_lowercase();

    capitalized_phrase_regex()
        .find_iter(response)
        .map(|m| m.as_str().trim().to_string())
        .filter(|phrase| phrase.split_whitespace().count() <= 2)
        .filter(|phrase| {
            let lower = phrase.to_lowercase();
            !category_lower.contains(&lower) && !suggested_lower.contains(&lower)
        })
        .take(3)
        .collect()
}

/// Owned copy of the default catalog, for settings defaults and tests.
pub fn default_catalog() -> Vec<String> {
    DEFAULT_CATALOG.iter().map(|s| s.to_string()).collect()
}
