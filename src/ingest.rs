//! Link ingestion pipeline
//!
//! Canonicalize → extract → condense → classify → parse → upsert. Network and
//! model failures are absorbed into fallback values along the way; by the time
//! a record reaches the store it is always well-formed. Only a malformed URL
//! or a store write failure surfaces as an error.

use thiserror::Error;

use crate::canonical;
use crate::classify::{self, KEYWORD_NONE};
use crate::db::{Database, Link};
use crate::extract;
use crate::ollama::{truncate_chars, OllamaClient};
use crate::settings;

/// Errors that reach the caller. Fetch and classification failures never
/// appear here: they recover locally into fallback values.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// What happened to one ingested URL.
#[derive(Debug)]
pub enum IngestOutcome {
    Added(Box<Link>),
    /// The canonical URL already exists; nothing was written.
    Duplicate(String),
}

/// A fully derived link record, ready for the graph upsert.
#[derive(Debug, Clone)]
pub struct ParsedLink {
    pub url: String,
    pub title: String,
    pub raw_category: String,
    pub suggested_category: String,
    pub category: String,
    pub raw_content: String,
    pub cleaned_content: String,
    /// Up to 3 keywords, or the single sentinel "none"
    pub keywords: Vec<String>,
    pub category_explanation: String,
    pub keyword_explanation: String,
}

impl ParsedLink {
    fn to_link(&self) -> Link {
        Link {
            url: self.url.clone(),
            title: self.title.clone(),
            raw_category: self.raw_category.clone(),
            suggested_category: self.suggested_category.clone(),
            raw_content: self.raw_content.clone(),
            cleaned_content: self.cleaned_content.clone(),
            keywords: self.keywords.join(","),
            category_explanation: self.category_explanation.clone(),
            keyword_explanation: self.keyword_explanation.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Keywords that become HAS_KEYWORD edges (the sentinel is not a node).
    fn edge_keywords(&self) -> impl Iterator<Item = &String> {
        self.keywords
            .iter()
            .filter(|k| !k.eq_ignore_ascii_case(KEYWORD_NONE) && !k.trim().is_empty())
    }
}

/// Ingest one raw URL end to end.
pub async fn add_link(
    db: &Database,
    ollama: &OllamaClient,
    raw_url: &str,
) -> Result<IngestOutcome, IngestError> {
    let url = canonical::canonicalize(raw_url)?;

    // Duplicate check happens before any network work.
    if db.link_exists(&url)? {
        println!("[Ingest] Duplicate, skipping: {}", url);
        return Ok(IngestOutcome::Duplicate(url));
    }

    let parsed = derive_link(ollama, &url).await;
    upsert_link_record(db, &parsed)
}

/// Run the extract → condense → classify → parse chain for a canonical URL.
///
/// Never fails: every step substitutes its fallback value.
pub async fn derive_link(ollama: &OllamaClient, url: &str) -> ParsedLink {
    let page = extract::fetch_page(url).await;
    if !page.fetched {
        println!("[Ingest] Fetch failed for {}, continuing with fallback", url);
    }

    let cleaned_content = ollama.condense_content(&page.content).await;

    // Prefer the condensed content; otherwise the first 1000 chars of raw.
    let excerpt = if cleaned_content.is_empty() {
        truncate_chars(&page.content, 1000).to_string()
    } else {
        cleaned_content.clone()
    };

    let raw_category = ollama.classify_link(&page.title, &excerpt).await;
    let catalog = settings::get_catalog();
    let classification = classify::parse_classification(&raw_category, &catalog);

    println!(
        "[Ingest] {} -> category '{}', keywords {:?}",
        url, classification.category, classification.keywords
    );

    ParsedLink {
        url: url.to_string(),
        title: page.title,
        raw_category,
        suggested_category: classification.suggested_category,
        category: classification.category,
        raw_content: page.content,
        cleaned_content,
        keywords: classification.keywords,
        category_explanation: "None".to_string(),
        keyword_explanation: "None".to_string(),
    }
}

/// Graph upsert: create the Link node plus its category and keyword relations.
///
/// Duplicate-skip contract: an existing canonical URL means zero writes, so
/// curated records are never clobbered. All the ensure-steps are
/// create-if-absent; repeating the whole sequence is a no-op. The sequence
/// runs outside a transaction, so an interruption can leave an edge-less
/// Link. That link is harmless and simply lists as Uncategorized.
pub fn upsert_link_record(db: &Database, parsed: &ParsedLink) -> Result<IngestOutcome, IngestError> {
    if db.link_exists(&parsed.url)? {
        return Ok(IngestOutcome::Duplicate(parsed.url.clone()));
    }

    let link = parsed.to_link();
    db.insert_link(&link)?;

    db.ensure_category(&parsed.category)?;
    db.ensure_belongs_to(&parsed.url, &parsed.category)?;

    for keyword in parsed.edge_keywords() {
        db.ensure_keyword(keyword)?;
        db.ensure_has_keyword(&parsed.url, keyword)?;
    }

    Ok(IngestOutcome::Added(Box::new(link)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(url: &str) -> ParsedLink {
        ParsedLink {
            url: url.to_string(),
            title: "Kùzu Database".to_string(),
            raw_category: "Category: Database Keywords: graph, query".to_string(),
            suggested_category: "Database".to_string(),
            category: "Database".to_string(),
            raw_content: "content".to_string(),
            cleaned_content: String::new(),
            keywords: vec!["graph".to_string(), "query".to_string()],
            category_explanation: "None".to_string(),
            keyword_explanation: "None".to_string(),
        }
    }

    #[test]
    fn test_upsert_creates_nodes_and_edges() {
        let db = Database::in_memory().unwrap();
        let outcome = upsert_link_record(&db, &parsed("https://kuzudb.com")).unwrap();
        assert!(matches!(outcome, IngestOutcome::Added(_)));

        assert!(db.link_exists("https://kuzudb.com").unwrap());
        assert_eq!(db.all_categories().unwrap(), vec!["Database".to_string()]);
        assert_eq!(db.all_keywords().unwrap().len(), 2);
        assert_eq!(db.belongs_to_pairs().unwrap().len(), 1);
        assert_eq!(db.has_keyword_pairs().unwrap().len(), 2);
    }

    #[test]
    fn test_upsert_twice_is_noop() {
        let db = Database::in_memory().unwrap();
        upsert_link_record(&db, &parsed("https://kuzudb.com")).unwrap();

        let second = upsert_link_record(&db, &parsed("https://kuzudb.com")).unwrap();
        assert!(matches!(second, IngestOutcome::Duplicate(_)));

        // Same node/edge set as after one application.
        assert_eq!(db.count_links().unwrap(), 1);
        assert_eq!(db.belongs_to_pairs().unwrap().len(), 1);
        assert_eq!(db.has_keyword_pairs().unwrap().len(), 2);
    }

    #[test]
    fn test_upsert_sentinel_keywords_create_no_edges() {
        let db = Database::in_memory().unwrap();
        let mut record = parsed("https://example.com");
        record.keywords = vec![KEYWORD_NONE.to_string()];

        upsert_link_record(&db, &record).unwrap();
        assert!(db.has_keyword_pairs().unwrap().is_empty());
        assert!(db.all_keywords().unwrap().is_empty());
    }

    #[test]
    fn test_upsert_shared_keyword_across_links() {
        let db = Database::in_memory().unwrap();
        upsert_link_record(&db, &parsed("https://kuzudb.com")).unwrap();
        upsert_link_record(&db, &parsed("https://neo4j.com")).unwrap();

        // One keyword node each, two edges each.
        assert_eq!(db.all_keywords().unwrap().len(), 2);
        assert_eq!(db.has_keyword_pairs().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_add_link_offline_falls_back_to_uncategorized() {
        // Unreachable fetch + unreachable Ollama: the link still lands, under
        // Uncategorized with no keyword edges.
        let db = Database::in_memory().unwrap();
        let ollama =
            OllamaClient::new("http://127.0.0.1:1".to_string(), "qwen2.5:7b".to_string(), 1);

        let outcome = add_link(&db, &ollama, "127.0.0.1:1/nowhere").await.unwrap();
        let IngestOutcome::Added(link) = outcome else {
            panic!("expected Added");
        };

        assert_eq!(link.title, link.url);
        assert_eq!(link.raw_content, extract::FETCH_FAILED);
        assert_eq!(link.keywords, KEYWORD_NONE);

        assert_eq!(db.all_categories().unwrap(), vec!["Uncategorized".to_string()]);
        assert_eq!(db.belongs_to_pairs().unwrap().len(), 1);
        assert!(db.has_keyword_pairs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_link_duplicate_skip() {
        let db = Database::in_memory().unwrap();
        let ollama =
            OllamaClient::new("http://127.0.0.1:1".to_string(), "qwen2.5:7b".to_string(), 1);

        upsert_link_record(&db, &parsed("https://kuzudb.com")).unwrap();

        // Same URL, un-canonicalized form: still detected as a duplicate.
        let outcome = add_link(&db, &ollama, "kuzudb.com/").await.unwrap();
        assert!(matches!(outcome, IngestOutcome::Duplicate(_)));
        assert_eq!(db.count_links().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_add_link_invalid_url_rejected() {
        let db = Database::in_memory().unwrap();
        let ollama =
            OllamaClient::new("http://127.0.0.1:1".to_string(), "qwen2.5:7b".to_string(), 1);

        let result = add_link(&db, &ollama, "http://").await;
        assert!(matches!(result, Err(IngestError::InvalidUrl(_))));
        assert_eq!(db.count_links().unwrap(), 0);
    }
}
