//! Graph export for visualization
//!
//! Flattens the store into the `{nodes, edges}` shape the graph view renders.
//! Node ids are namespaced by entity kind (`Link:`, `Category:`, `Keyword:`)
//! so a category and a keyword sharing a literal name never collide.

use serde::Serialize;
use std::collections::HashSet;

use crate::db::Database;

#[derive(Debug, Clone, Serialize)]
pub struct VizNode {
    pub id: String,
    pub label: String,
    pub group: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VizEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct GraphView {
    pub nodes: Vec<VizNode>,
    pub edges: Vec<VizEdge>,
}

fn link_id(url: &str) -> String {
    format!("Link:{}", url)
}

fn category_id(name: &str) -> String {
    format!("Category:{}", name)
}

fn keyword_id(name: &str) -> String {
    format!("Keyword:{}", name)
}

/// Read every node and edge into the visualization view.
///
/// Ends with a diagnostic duplicate-id scan: collisions are reported on
/// stderr but never fail the export.
pub fn export_graph(db: &Database) -> Result<GraphView, rusqlite::Error> {
    let mut view = GraphView::default();

    for link in db.all_links()? {
        if link.url.is_empty() {
            continue;
        }
        view.nodes.push(VizNode {
            id: link_id(&link.url),
            label: link.title.clone(),
            group: "link".to_string(),
        });
    }

    for name in db.all_categories()? {
        if name.is_empty() {
            continue;
        }
        view.nodes.push(VizNode {
            id: category_id(&name),
            label: name,
            group: "category".to_string(),
        });
    }

    for name in db.all_keywords()? {
        if name.is_empty() {
            continue;
        }
        view.nodes.push(VizNode {
            id: keyword_id(&name),
            label: name,
            group: "keyword".to_string(),
        });
    }

    for (url, category) in db.belongs_to_pairs()? {
        view.edges.push(VizEdge {
            from: link_id(&url),
            to: category_id(&category),
        });
    }

    for (url, keyword) in db.has_keyword_pairs()? {
        view.edges.push(VizEdge {
            from: link_id(&url),
            to: keyword_id(&keyword),
        });
    }

    report_duplicate_ids(&view.nodes);
    Ok(view)
}

/// Diagnostic check only; namespacing should make collisions impossible.
fn report_duplicate_ids(nodes: &[VizNode]) {
    let mut seen = HashSet::new();
    for node in nodes {
        if !seen.insert(node.id.as_str()) {
            eprintln!("[Export] Duplicate node id in export: {}", node.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{upsert_link_record, ParsedLink};

    fn record(url: &str, category: &str, keywords: &[&str]) -> ParsedLink {
        ParsedLink {
            url: url.to_string(),
            title: format!("Title of {}", url),
            raw_category: String::new(),
            suggested_category: category.to_string(),
            category: category.to_string(),
            raw_content: String::new(),
            cleaned_content: String::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            category_explanation: "None".to_string(),
            keyword_explanation: "None".to_string(),
        }
    }

    #[test]
    fn test_export_namespaces_ids() {
        let db = Database::in_memory().unwrap();
        // Category "News" and keyword "News" share a literal name.
        upsert_link_record(&db, &record("https://a.example.com", "News", &["News"])).unwrap();

        let view = export_graph(&db).unwrap();

        let ids: Vec<&str> = view.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"Link:https://a.example.com"));
        assert!(ids.contains(&"Category:News"));
        assert!(ids.contains(&"Keyword:News"));

        // No collisions despite the shared name.
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_export_edges_reference_namespaced_ids() {
        let db = Database::in_memory().unwrap();
        upsert_link_record(&db, &record("https://a.example.com", "Database", &["graph"])).unwrap();

        let view = export_graph(&db).unwrap();
        assert_eq!(view.edges.len(), 2);
        assert!(view
            .edges
            .iter()
            .any(|e| e.from == "Link:https://a.example.com" && e.to == "Category:Database"));
        assert!(view
            .edges
            .iter()
            .any(|e| e.from == "Link:https://a.example.com" && e.to == "Keyword:graph"));
    }

    #[test]
    fn test_export_empty_store() {
        let db = Database::in_memory().unwrap();
        let view = export_graph(&db).unwrap();
        assert!(view.nodes.is_empty());
        assert!(view.edges.is_empty());
    }

    #[test]
    fn test_export_serializes_to_expected_shape() {
        let db = Database::in_memory().unwrap();
        upsert_link_record(&db, &record("https://a.example.com", "News", &["none"])).unwrap();

        let json = serde_json::to_value(export_graph(&db).unwrap()).unwrap();
        assert!(json["nodes"].is_array());
        assert!(json["edges"].is_array());
        assert_eq!(json["nodes"][0]["group"], "link");
        assert!(json["nodes"][0]["id"].as_str().unwrap().starts_with("Link:"));
    }
}
