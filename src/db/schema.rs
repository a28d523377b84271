use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::Path;
use std::sync::Mutex;

use super::models::{Link, LinkSummary};

pub struct Database {
    conn: Mutex<Connection>,
    path: String,
}

impl Database {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let conn = Connection::open(&path)?;
        let db = Database {
            conn: Mutex::new(conn),
            path: path_str,
        };
        db.init()?;
        Ok(db)
    }

    pub fn get_path(&self) -> String {
        self.path.clone()
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn: Mutex::new(conn),
            path: ":memory:".to_string(),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS links (
                url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                raw_category TEXT NOT NULL DEFAULT '',
                suggested_category TEXT NOT NULL DEFAULT 'Uncategorized',
                raw_content TEXT NOT NULL DEFAULT '',
                cleaned_content TEXT NOT NULL DEFAULT '',
                keywords TEXT NOT NULL DEFAULT 'none',
                category_explanation TEXT NOT NULL DEFAULT 'None',
                keyword_explanation TEXT NOT NULL DEFAULT 'None',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS categories (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS keywords (
                name TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS belongs_to (
                link_url TEXT NOT NULL REFERENCES links(url) ON DELETE CASCADE,
                category_name TEXT NOT NULL REFERENCES categories(name),
                UNIQUE (link_url, category_name)
            );

            CREATE TABLE IF NOT EXISTS has_keyword (
                link_url TEXT NOT NULL REFERENCES links(url) ON DELETE CASCADE,
                keyword_name TEXT NOT NULL REFERENCES keywords(name),
                UNIQUE (link_url, keyword_name)
            );

            CREATE INDEX IF NOT EXISTS idx_belongs_to_category ON belongs_to(category_name);
            CREATE INDEX IF NOT EXISTS idx_has_keyword_keyword ON has_keyword(keyword_name);
            ",
        )?;

        Ok(())
    }

    /// Seed the two sample links the empty store starts with. No-op when any
    /// link already exists, so it never re-seeds or clobbers.
    pub fn seed_if_empty(&self) -> Result<bool> {
        if self.count_links()? > 0 {
            return Ok(false);
        }

        let now = chrono::Utc::now().timestamp_millis();
        let samples = [
            ("https://kuzudb.com", "Kùzu Database"),
            ("https://example.com", "Example Site"),
        ];

        {
            let conn = self.conn.lock().unwrap();
            for (url, title) in samples {
                conn.execute(
                    "INSERT INTO links (url, title, raw_category, suggested_category, keywords, created_at)
                     VALUES (?1, ?2, 'Database', 'Database', 'none', ?3)",
                    params![url, title, now],
                )?;
            }
        }

        self.ensure_category("Database")?;
        for (url, _) in samples {
            self.ensure_belongs_to(url, "Database")?;
        }

        Ok(true)
    }

    // ==================== Links ====================

    pub fn insert_link(&self, link: &Link) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO links (url, title, raw_category, suggested_category, raw_content,
                                cleaned_content, keywords, category_explanation,
                                keyword_explanation, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                link.url,
                link.title,
                link.raw_category,
                link.suggested_category,
                link.raw_content,
                link.cleaned_content,
                link.keywords,
                link.category_explanation,
                link.keyword_explanation,
                link.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn link_exists(&self, url: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM links WHERE url = ?1",
            params![url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_link(&self, url: &str) -> Result<Option<Link>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT url, title, raw_category, suggested_category, raw_content,
                    cleaned_content, keywords, category_explanation, keyword_explanation,
                    created_at
             FROM links WHERE url = ?1",
            params![url],
            row_to_link,
        )
        .optional()
    }

    pub fn all_links(&self) -> Result<Vec<Link>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT url, title, raw_category, suggested_category, raw_content,
                    cleaned_content, keywords, category_explanation, keyword_explanation,
                    created_at
             FROM links ORDER BY created_at",
        )?;
        let links = stmt
            .query_map([], row_to_link)?
            .collect::<Result<Vec<_>>>()?;
        Ok(links)
    }

    /// Links joined with their category (Uncategorized when edge-less, which
    /// can happen if an upsert sequence was interrupted).
    pub fn get_links_with_categories(&self) -> Result<Vec<LinkSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT l.url, l.title, COALESCE(b.category_name, 'Uncategorized')
             FROM links l
             LEFT JOIN belongs_to b ON b.link_url = l.url
             ORDER BY l.created_at",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LinkSummary {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    category: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Delete a link; its BELONGS_TO / HAS_KEYWORD edges cascade. Categories
    /// and keywords stay behind (orphans are acceptable).
    pub fn delete_link(&self, url: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM links WHERE url = ?1", params![url])?;
        Ok(affected > 0)
    }

    pub fn count_links(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))
    }

    // ==================== Categories & Keywords ====================

    /// Create the category if absent. Idempotent.
    pub fn ensure_category(&self, name: &str) -> Result<()> {
        ensure_named(&self.conn, "categories", name)
    }

    /// Create the keyword if absent. Idempotent.
    pub fn ensure_keyword(&self, name: &str) -> Result<()> {
        ensure_named(&self.conn, "keywords", name)
    }

    pub fn all_categories(&self) -> Result<Vec<String>> {
        all_named(&self.conn, "categories")
    }

    pub fn all_keywords(&self) -> Result<Vec<String>> {
        all_named(&self.conn, "keywords")
    }

    pub fn count_categories(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
    }

    pub fn count_keywords(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT COUNT(*) FROM keywords", [], |row| row.get(0))
    }

    // ==================== Edges ====================

    /// Create the BELONGS_TO edge if absent. Idempotent.
    pub fn ensure_belongs_to(&self, link_url: &str, category_name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO belongs_to (link_url, category_name) VALUES (?1, ?2)",
            params![link_url, category_name],
        )?;
        Ok(())
    }

    /// Create the HAS_KEYWORD edge if absent. Idempotent.
    pub fn ensure_has_keyword(&self, link_url: &str, keyword_name: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO has_keyword (link_url, keyword_name) VALUES (?1, ?2)",
            params![link_url, keyword_name],
        )?;
        Ok(())
    }

    pub fn belongs_to_pairs(&self) -> Result<Vec<(String, String)>> {
        edge_pairs(&self.conn, "SELECT link_url, category_name FROM belongs_to")
    }

    pub fn has_keyword_pairs(&self) -> Result<Vec<(String, String)>> {
        edge_pairs(&self.conn, "SELECT link_url, keyword_name FROM has_keyword")
    }

    pub fn count_edges(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let belongs: i64 =
            conn.query_row("SELECT COUNT(*) FROM belongs_to", [], |row| row.get(0))?;
        let has_kw: i64 =
            conn.query_row("SELECT COUNT(*) FROM has_keyword", [], |row| row.get(0))?;
        Ok(belongs + has_kw)
    }
}

fn row_to_link(row: &rusqlite::Row<'_>) -> Result<Link> {
    Ok(Link {
        url: row.get(0)?,
        title: row.get(1)?,
        raw_category: row.get(2)?,
        suggested_category: row.get(3)?,
        raw_content: row.get(4)?,
        cleaned_content: row.get(5)?,
        keywords: row.get(6)?,
        category_explanation: row.get(7)?,
        keyword_explanation: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn ensure_named(conn: &Mutex<Connection>, table: &str, name: &str) -> Result<()> {
    debug_assert!(!name.trim().is_empty(), "node name must be non-empty");
    let now = chrono::Utc::now().timestamp_millis();
    let conn = conn.lock().unwrap();
    // Table name comes from the two callers above, never user input; the
    // value itself is always parameter-bound.
    conn.execute(
        &format!("INSERT OR IGNORE INTO {} (name, created_at) VALUES (?1, ?2)", table),
        params![name, now],
    )?;
    Ok(())
}

fn all_named(conn: &Mutex<Connection>, table: &str) -> Result<Vec<String>> {
    let conn = conn.lock().unwrap();
    let mut stmt = conn.prepare(&format!("SELECT name FROM {} ORDER BY name", table))?;
    let names = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>>>()?;
    Ok(names)
}

fn edge_pairs(conn: &Mutex<Connection>, sql: &str) -> Result<Vec<(String, String)>> {
    let conn = conn.lock().unwrap();
    let mut stmt = conn.prepare(sql)?;
    let pairs = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>>>()?;
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_link(url: &str) -> Link {
        Link {
            url: url.to_string(),
            title: "Sample".to_string(),
            raw_category: "Category: Database".to_string(),
            suggested_category: "Database".to_string(),
            raw_content: "content".to_string(),
            cleaned_content: String::new(),
            keywords: "graph,database".to_string(),
            category_explanation: "None".to_string(),
            keyword_explanation: "None".to_string(),
            created_at: 1,
        }
    }

    #[test]
    fn test_insert_and_exists() {
        let db = Database::in_memory().unwrap();
        assert!(!db.link_exists("https://kuzudb.com").unwrap());

        db.insert_link(&sample_link("https://kuzudb.com")).unwrap();
        assert!(db.link_exists("https://kuzudb.com").unwrap());

        let loaded = db.get_link("https://kuzudb.com").unwrap().unwrap();
        assert_eq!(loaded.suggested_category, "Database");
    }

    #[test]
    fn test_duplicate_insert_is_error() {
        let db = Database::in_memory().unwrap();
        db.insert_link(&sample_link("https://kuzudb.com")).unwrap();
        assert!(db.insert_link(&sample_link("https://kuzudb.com")).is_err());
    }

    #[test]
    fn test_ensure_category_idempotent() {
        let db = Database::in_memory().unwrap();
        db.ensure_category("Database").unwrap();
        db.ensure_category("Database").unwrap();
        assert_eq!(db.all_categories().unwrap(), vec!["Database".to_string()]);
    }

    #[test]
    fn test_ensure_edge_idempotent() {
        let db = Database::in_memory().unwrap();
        db.insert_link(&sample_link("https://kuzudb.com")).unwrap();
        db.ensure_category("Database").unwrap();

        db.ensure_belongs_to("https://kuzudb.com", "Database").unwrap();
        db.ensure_belongs_to("https://kuzudb.com", "Database").unwrap();

        assert_eq!(db.belongs_to_pairs().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_link_cascades_edges() {
        let db = Database::in_memory().unwrap();
        db.insert_link(&sample_link("https://kuzudb.com")).unwrap();
        db.ensure_category("Database").unwrap();
        db.ensure_keyword("graph").unwrap();
        db.ensure_belongs_to("https://kuzudb.com", "Database").unwrap();
        db.ensure_has_keyword("https://kuzudb.com", "graph").unwrap();

        assert!(db.delete_link("https://kuzudb.com").unwrap());
        assert_eq!(db.count_edges().unwrap(), 0);

        // Category and keyword nodes survive as orphans.
        assert_eq!(db.all_categories().unwrap().len(), 1);
        assert_eq!(db.all_keywords().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_missing_link_returns_false() {
        let db = Database::in_memory().unwrap();
        assert!(!db.delete_link("https://nope.example").unwrap());
    }

    #[test]
    fn test_seed_if_empty_runs_once() {
        let db = Database::in_memory().unwrap();
        assert!(db.seed_if_empty().unwrap());
        assert_eq!(db.count_links().unwrap(), 2);
        assert_eq!(db.all_categories().unwrap(), vec!["Database".to_string()]);

        // Second call is a no-op.
        assert!(!db.seed_if_empty().unwrap());
        assert_eq!(db.count_links().unwrap(), 2);
    }

    #[test]
    fn test_links_with_categories_join() {
        let db = Database::in_memory().unwrap();
        db.seed_if_empty().unwrap();
        let rows = db.get_links_with_categories().unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.category == "Database"));
    }
}
