//! Batch CSV ingestion
//!
//! Feeds a CSV of links through the ingestion pipeline one row at a time.
//! A row either carries just a `url` (full pipeline: fetch, condense,
//! classify) or arrives with precomputed metadata columns and skips the
//! network entirely. One bad row never aborts the batch: its failure is
//! recorded and processing moves on.

use serde::Deserialize;

use crate::canonical;
use crate::classify::{self, KEYWORD_NONE, UNCATEGORIZED};
use crate::db::Database;
use crate::extract::MAX_CONTENT_CHARS;
use crate::ingest::{self, IngestOutcome, ParsedLink};
use crate::ollama::{truncate_chars, OllamaClient};
use crate::settings;

/// One CSV row. Only `url` is required; the optional columns switch the row
/// onto the precomputed-metadata path.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsvRow {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Comma-separated, truncated to 3
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub category_explanation: Option<String>,
    #[serde(default)]
    pub keyword_explanation: Option<String>,
}

impl CsvRow {
    /// Rows with title, content, and category skip extraction and
    /// classification; keyword and explanation columns default when absent.
    fn has_metadata(&self) -> bool {
        self.title.is_some() && self.content.is_some() && self.category.is_some()
    }
}

/// Aggregate result of one batch run.
#[derive(Debug, Default, serde::Serialize)]
pub struct BatchResult {
    /// Links actually added to the store
    pub processed: usize,
    /// Empty-URL and duplicate rows
    pub skipped: usize,
    pub skip_reasons: Vec<String>,
    /// Per-row failures; the batch continued past each of them
    pub errors: Vec<String>,
}

/// Ingest up to `limit` rows from a CSV file. Strictly sequential: the
/// classifier is assumed to have no spare concurrent capacity.
pub async fn ingest_csv_file(
    db: &Database,
    ollama: &OllamaClient,
    path: &str,
    limit: usize,
) -> Result<BatchResult, String> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| format!("Failed to open {}: {}", path, e))?;

    let mut result = BatchResult::default();
    let mut rows_seen = 0usize;

    for (index, record) in reader.deserialize::<CsvRow>().enumerate() {
        if rows_seen >= limit {
            println!("[Batch] Batch limit {} reached, remaining rows left for later", limit);
            break;
        }
        rows_seen += 1;

        let row_label = index + 1;
        let row = match record {
            Ok(row) => row,
            Err(e) => {
                result.errors.push(format!("Row {}: unreadable ({})", row_label, e));
                continue;
            }
        };

        match process_row(db, ollama, &row).await {
            Ok(RowOutcome::Added(url)) => {
                println!("[Batch] Row {}: added {}", row_label, url);
                result.processed += 1;
            }
            Ok(RowOutcome::Skipped(reason)) => {
                result.skipped += 1;
                result.skip_reasons.push(format!("Row {}: {}", row_label, reason));
            }
            Err(e) => {
                eprintln!("[Batch] Row {} failed: {}", row_label, e);
                result.errors.push(format!("Row {}: {}", row_label, e));
            }
        }
    }

    println!(
        "[Batch] Done: {} added, {} skipped, {} errors",
        result.processed,
        result.skipped,
        result.errors.len()
    );
    Ok(result)
}

enum RowOutcome {
    Added(String),
    Skipped(String),
}

async fn process_row(
    db: &Database,
    ollama: &OllamaClient,
    row: &CsvRow,
) -> Result<RowOutcome, String> {
    if row.url.trim().is_empty() {
        return Ok(RowOutcome::Skipped("empty URL".to_string()));
    }

    let url = canonical::canonicalize(&row.url).map_err(|e| e.to_string())?;

    if db.link_exists(&url).map_err(|e| e.to_string())? {
        return Ok(RowOutcome::Skipped(format!("duplicate: {}", url)));
    }

    let parsed = if row.has_metadata() {
        metadata_record(row, &url)
    } else {
        ingest::derive_link(ollama, &url).await
    };

    match ingest::upsert_link_record(db, &parsed).map_err(|e| e.to_string())? {
        IngestOutcome::Added(link) => Ok(RowOutcome::Added(link.url)),
        IngestOutcome::Duplicate(url) => Ok(RowOutcome::Skipped(format!("duplicate: {}", url))),
    }
}

/// Build a record from precomputed CSV columns. The bare category string is
/// still pushed through the response-parser contract so it lands on a catalog
/// name (or Uncategorized), same as a live model response would.
fn metadata_record(row: &CsvRow, url: &str) -> ParsedLink {
    let catalog = settings::get_catalog();

    let raw_category = row.category.clone().unwrap_or_default();
    let classification = classify::parse_classification(&raw_category, &catalog);

    let suggested_category = if raw_category.trim().is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        raw_category.trim().to_string()
    };

    let keywords = keyword_list(row.keyword.as_deref().unwrap_or(""));
    let content = row.content.clone().unwrap_or_default();

    ParsedLink {
        url: url.to_string(),
        title: row.title.clone().unwrap_or_else(|| url.to_string()),
        raw_category,
        suggested_category,
        category: classification.category,
        raw_content: truncate_chars(&content, MAX_CONTENT_CHARS).to_string(),
        cleaned_content: String::new(),
        keywords,
        category_explanation: row
            .category_explanation
            .clone()
            .unwrap_or_else(|| "None".to_string()),
        keyword_explanation: row
            .keyword_explanation
            .clone()
            .unwrap_or_else(|| "None".to_string()),
    }
}

/// Split the CSV keyword column: comma-separated, trimmed, capped at 3,
/// sentinel when nothing survives.
fn keyword_list(raw: &str) -> Vec<String> {
    let keywords: Vec<String> = raw
        .split(',')
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .take(3)
        .collect();
    if keywords.is_empty() {
        vec![KEYWORD_NONE.to_string()]
    } else {
        keywords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn offline_ollama() -> OllamaClient {
        OllamaClient::new("http://127.0.0.1:1".to_string(), "qwen2.5:7b".to_string(), 1)
    }

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_metadata_rows_skip_network() {
        let db = Database::in_memory().unwrap();
        let csv = write_csv(
            "url,title,content,category,keyword\n\
             kuzudb.com,Kùzu,An embedded graph database,Database,\"graph, embedded\"\n\
             news.example.com,Daily News,Headlines,News,\n",
        );

        let result = ingest_csv_file(&db, &offline_ollama(), csv.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        assert_eq!(result.processed, 2);
        assert_eq!(result.skipped, 0);
        assert!(result.errors.is_empty());

        let link = db.get_link("https://kuzudb.com").unwrap().unwrap();
        assert_eq!(link.title, "Kùzu");
        assert_eq!(link.keywords, "graph,embedded");

        let categories = db.all_categories().unwrap();
        assert!(categories.contains(&"Database".to_string()));
        assert!(categories.contains(&"News".to_string()));

        // The News row had no keyword column value: sentinel, no edges.
        let news = db.get_link("https://news.example.com").unwrap().unwrap();
        assert_eq!(news.keywords, "none");
    }

    #[tokio::test]
    async fn test_category_normalized_through_parser() {
        let db = Database::in_memory().unwrap();
        let csv = write_csv(
            "url,title,content,category,keyword\n\
             a.example.com,A,text,database,x\n\
             b.example.com,B,text,Underwater Basketry,y\n",
        );

        ingest_csv_file(&db, &offline_ollama(), csv.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        // "database" normalizes onto the catalog entry; the unknown category
        // falls to Uncategorized but survives verbatim as the suggestion.
        let a = db.get_link("https://a.example.com").unwrap().unwrap();
        assert_eq!(a.suggested_category, "database");
        let pairs = db.belongs_to_pairs().unwrap();
        assert!(pairs.contains(&("https://a.example.com".to_string(), "Database".to_string())));
        assert!(pairs.contains(&("https://b.example.com".to_string(), "Uncategorized".to_string())));

        let b = db.get_link("https://b.example.com").unwrap().unwrap();
        assert_eq!(b.suggested_category, "Underwater Basketry");
    }

    #[tokio::test]
    async fn test_duplicates_and_empty_urls_skipped() {
        let db = Database::in_memory().unwrap();
        let csv = write_csv(
            "url,title,content,category,keyword\n\
             kuzudb.com,Kùzu,text,Database,graph\n\
             ,Empty,text,News,\n\
             kuzudb.com/,Kùzu again,text,Database,graph\n",
        );

        let result = ingest_csv_file(&db, &offline_ollama(), csv.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        assert_eq!(result.processed, 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.skip_reasons.len(), 2);
        assert_eq!(db.count_links().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_row_failure_does_not_abort_batch() {
        let db = Database::in_memory().unwrap();
        let csv = write_csv(
            "url,title,content,category,keyword\n\
             http://,Broken,text,News,\n\
             ok.example.com,Fine,text,News,\n",
        );

        let result = ingest_csv_file(&db, &offline_ollama(), csv.path().to_str().unwrap(), 100)
            .await
            .unwrap();

        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.processed, 1);
        assert!(db.link_exists("https://ok.example.com").unwrap());
    }

    #[tokio::test]
    async fn test_batch_limit_leaves_rest_unprocessed() {
        let db = Database::in_memory().unwrap();
        let csv = write_csv(
            "url,title,content,category,keyword\n\
             a.example.com,A,text,News,\n\
             b.example.com,B,text,News,\n\
             c.example.com,C,text,News,\n",
        );

        let result = ingest_csv_file(&db, &offline_ollama(), csv.path().to_str().unwrap(), 2)
            .await
            .unwrap();

        assert_eq!(result.processed, 2);
        assert!(!db.link_exists("https://c.example.com").unwrap());
    }

    #[test]
    fn test_keyword_list_caps_at_three() {
        assert_eq!(keyword_list("a, b, c, d"), vec!["a", "b", "c"]);
        assert_eq!(keyword_list(" , "), vec!["none"]);
        assert_eq!(keyword_list(""), vec!["none"]);
    }
}
