//! SQLite FTS5 keyword index for local and offline use.

use crate::search::{IndexSchema, SearchBackend};
use crate::types::{IndexedRecord, RecordStatus, SearchHit};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tally_core::{AppError, AppResult};

/// Local search index backed by an FTS5 virtual table.
pub struct SqliteSearchBackend {
    conn: Mutex<Connection>,
}

impl SqliteSearchBackend {
    /// Open (or create) the index database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;
        ensure_tables(&conn)?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// An index that lives only as long as this value.
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Knowledge(format!("Failed to open SQLite index: {}", e)))?;
        ensure_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of indexed records.
    pub fn count(&self) -> AppResult<usize> {
        self.lock()
            .query_row("SELECT COUNT(*) FROM records_fts", [], |row| {
                row.get::<_, i64>(0).map(|v| v as usize)
            })
            .map_err(|e| AppError::Knowledge(format!("Failed to count records: {}", e)))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// FTS5 has no `IF NOT EXISTS` for virtual tables in older SQLite, so check
/// `sqlite_master` first.
fn ensure_tables(conn: &Connection) -> AppResult<()> {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='records_fts'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to inspect index schema: {}", e)))?;

    if !exists {
        conn.execute_batch(
            r#"
            CREATE VIRTUAL TABLE records_fts USING fts5(
                id UNINDEXED,
                document_name,
                content,
                document_url UNINDEXED,
                source UNINDEXED
            );
            "#,
        )
        .map_err(|e| AppError::Knowledge(format!("Failed to create index table: {}", e)))?;
    }

    Ok(())
}

/// Quote each word so user text cannot inject FTS5 syntax.
fn sanitize_query(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();

    (!terms.is_empty()).then(|| terms.join(" OR "))
}

fn column_for(field: &str) -> Option<&'static str> {
    match field {
        "content" => Some("content"),
        "documentName" => Some("document_name"),
        _ => None,
    }
}

fn insert_record(conn: &Connection, record: &IndexedRecord) -> rusqlite::Result<()> {
    conn.execute("DELETE FROM records_fts WHERE id = ?1", params![record.id])?;
    conn.execute(
        "INSERT INTO records_fts (id, document_name, content, document_url, source)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.id,
            record.document_name,
            record.content,
            record.document_url,
            record.source,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl SearchBackend for SqliteSearchBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn create_or_update_schema(&self, schema: &IndexSchema) -> AppResult<()> {
        if !schema.fields.iter().any(|f| f.key && f.name == "id") {
            return Err(AppError::Knowledge(format!(
                "Index schema '{}' must use 'id' as its key",
                schema.name
            )));
        }
        ensure_tables(&self.lock())
    }

    async fn upsert(&self, records: &[IndexedRecord]) -> AppResult<Vec<RecordStatus>> {
        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| AppError::Knowledge(format!("Failed to begin transaction: {}", e)))?;

        let mut statuses = Vec::with_capacity(records.len());
        for record in records {
            if record.id.trim().is_empty() {
                statuses.push(RecordStatus::failed(&record.id, "missing key"));
                continue;
            }
            match insert_record(&tx, record) {
                Ok(()) => statuses.push(RecordStatus::ok(&record.id)),
                Err(e) => statuses.push(RecordStatus::failed(&record.id, e.to_string())),
            }
        }

        tx.commit()
            .map_err(|e| AppError::Knowledge(format!("Failed to commit records: {}", e)))?;
        Ok(statuses)
    }

    async fn search(&self, text: &str, top_k: usize, fields: &[String]) -> AppResult<Vec<SearchHit>> {
        let Some(query) = sanitize_query(text) else {
            return Ok(Vec::new());
        };

        let columns: Vec<&str> = fields.iter().filter_map(|f| column_for(f)).collect();
        let match_expr = if columns.is_empty() {
            query
        } else {
            format!("{{{}}} : ({})", columns.join(" "), query)
        };

        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT content, document_name, document_url, bm25(records_fts) AS score
                 FROM records_fts
                 WHERE records_fts MATCH ?1
                 ORDER BY score
                 LIMIT ?2",
            )
            .map_err(|e| AppError::Knowledge(format!("Failed to prepare search: {}", e)))?;

        let hits = stmt
            .query_map(params![match_expr, top_k as i64], |row| {
                let score: f64 = row.get(3)?;
                Ok(SearchHit {
                    content: row.get(0)?,
                    document_name: row.get(1)?,
                    document_url: row.get(2)?,
                    // bm25 is lower-is-better
                    rank: -score,
                })
            })
            .map_err(|e| AppError::Knowledge(format!("Search failed: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Knowledge(format!("Failed to read search results: {}", e)))?;

        tracing::debug!(hits = hits.len(), top_k, "SQLite search completed");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str, content: &str) -> IndexedRecord {
        IndexedRecord {
            id: id.to_string(),
            content: content.to_string(),
            document_name: name.to_string(),
            document_url: format!("https://docs/{}", name),
            source: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let backend = SqliteSearchBackend::open_in_memory().unwrap();
        let records = vec![
            record("1", "refunds.md", "refunds take five days"),
            record("2", "shipping.md", "shipping is free over fifty"),
        ];

        backend.upsert(&records).await.unwrap();
        backend.upsert(&records).await.unwrap();
        assert_eq!(backend.count().unwrap(), 2);

        let hits = backend.search("refunds", 5, &[]).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_name, "refunds.md");
    }

    #[tokio::test]
    async fn test_upsert_replaces_content() {
        let backend = SqliteSearchBackend::open_in_memory().unwrap();
        backend
            .upsert(&[record("1", "policy.md", "old wording")])
            .await
            .unwrap();
        backend
            .upsert(&[record("1", "policy.md", "new wording")])
            .await
            .unwrap();

        assert_eq!(backend.count().unwrap(), 1);
        assert!(backend.search("old", 5, &[]).await.unwrap().is_empty());
        assert_eq!(backend.search("new", 5, &[]).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_key_is_reported_per_record() {
        let backend = SqliteSearchBackend::open_in_memory().unwrap();
        let statuses = backend
            .upsert(&[record("", "a.md", "x"), record("b", "b.md", "y")])
            .await
            .unwrap();

        assert!(!statuses[0].succeeded);
        assert_eq!(statuses[0].error.as_deref(), Some("missing key"));
        assert!(statuses[1].succeeded);
    }

    #[tokio::test]
    async fn test_search_respects_top_k_and_fields() {
        let backend = SqliteSearchBackend::open_in_memory().unwrap();
        backend
            .upsert(&[
                record("1", "budget.xlsx", "quarterly numbers"),
                record("2", "notes.md", "budget review budget plan budget"),
                record("3", "misc.md", "budget"),
            ])
            .await
            .unwrap();

        assert_eq!(backend.search("budget", 2, &[]).await.unwrap().len(), 2);

        let by_name = backend
            .search("budget", 5, &["documentName".to_string()])
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].document_name, "budget.xlsx");
    }

    #[tokio::test]
    async fn test_query_syntax_is_neutralized() {
        let backend = SqliteSearchBackend::open_in_memory().unwrap();
        backend
            .upsert(&[record("1", "a.md", "alpha beta")])
            .await
            .unwrap();

        assert_eq!(backend.search("alpha AND (", 5, &[]).await.unwrap().len(), 1);
        assert!(backend.search("?!", 5, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("index/documents.sqlite");
        let backend = SqliteSearchBackend::open(&path).unwrap();
        let schema = IndexSchema::default_for("documents");

        backend.create_or_update_schema(&schema).await.unwrap();
        backend.upsert(&[record("1", "a.md", "kept")]).await.unwrap();
        backend.create_or_update_schema(&schema).await.unwrap();
        assert_eq!(backend.count().unwrap(), 1);

        drop(backend);
        let reopened = SqliteSearchBackend::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn test_sanitize_query() {
        assert_eq!(
            sanitize_query("refund policy?").as_deref(),
            Some("\"refund\" OR \"policy\"")
        );
        assert_eq!(sanitize_query("  ").as_deref(), None);
    }
}
