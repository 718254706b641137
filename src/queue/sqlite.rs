use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, Row};
use url::Url;
use uuid::Uuid;

use super::{JobId, Queue, QueueError, QueueResult};
use crate::config::{QueueConfig, DEFAULT_TABLE_NAME};
use crate::uri::{normalize_uri, parse_uri, BaseUriCollection, CrawlUri};
use crate::utils::sha256_hex;

/// Produces ids for new jobs
pub type JobIdGenerator = Box<dyn Fn() -> JobId + Send + Sync>;

fn validate_table_name(table_name: &str) -> QueueResult<()> {
    if table_name.is_empty()
        || !table_name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(QueueError::InvalidTableName(table_name.to_string()));
    }
    Ok(())
}

/// Raw column values of one queue row
struct StoredRow {
    uri: String,
    level: u32,
    processed: bool,
    found_on: Option<String>,
    tags: Option<String>,
}

impl StoredRow {
    const COLUMNS: &'static str = "uri, level, processed, found_on, tags";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            uri: row.get(0)?,
            level: row.get(1)?,
            processed: row.get(2)?,
            found_on: row.get(3)?,
            tags: row.get(4)?,
        })
    }

    fn into_crawl_uri(self, job_id: &str) -> QueueResult<CrawlUri> {
        let corrupt = |source| QueueError::CorruptEntry {
            job_id: job_id.to_string(),
            source,
        };

        let uri = parse_uri(&self.uri).map_err(corrupt)?;
        let found_on = self
            .found_on
            .filter(|f| !f.is_empty())
            .map(|f| parse_uri(&f))
            .transpose()
            .map_err(corrupt)?;

        CrawlUri::from_stored(
            uri,
            self.level,
            self.processed,
            found_on,
            self.tags.as_deref().unwrap_or_default(),
        )
        .map_err(corrupt)
    }
}

/// Persistent queue backed by a single SQLite table
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection. Rows are
/// keyed by `(job_id, uri_hash)` where `uri_hash` is the hex SHA-256 of the
/// normalized URI, insertion order is the autoincrement `id`.
pub struct SqliteQueue {
    conn: Mutex<Connection>,
    table_name: String,
    job_id_generator: JobIdGenerator,
}

impl std::fmt::Debug for SqliteQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteQueue")
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

impl SqliteQueue {
    /// Open (or create) a database file and make sure the schema exists
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        Self::open_with_table(path, DEFAULT_TABLE_NAME)
    }

    /// Create in-memory queue (for testing)
    pub fn in_memory() -> QueueResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, DEFAULT_TABLE_NAME)
    }

    /// Open the database and table named by a [`QueueConfig`]
    pub fn from_config(config: &QueueConfig) -> QueueResult<Self> {
        Self::open_with_table(&config.sqlite_path, &config.table_name)
    }

    fn open_with_table(path: impl AsRef<Path>, table_name: &str) -> QueueResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let queue = Self::from_connection(conn, table_name)?;
        tracing::info!(path = %path.display(), table = %table_name, "SQLite queue initialized");

        Ok(queue)
    }

    fn from_connection(conn: Connection, table_name: &str) -> QueueResult<Self> {
        validate_table_name(table_name)?;
        let queue = Self {
            conn: Mutex::new(conn),
            table_name: table_name.to_string(),
            job_id_generator: Box::new(|| Uuid::new_v4().simple().to_string()),
        };
        queue.create_schema()?;
        Ok(queue)
    }

    /// Switch to another table, creating it if needed
    ///
    /// The name is interpolated into SQL, so [`QueueConfig`] validation rules
    /// apply: ASCII alphanumerics and underscores only.
    pub fn with_table_name(mut self, table_name: &str) -> QueueResult<Self> {
        validate_table_name(table_name)?;
        self.table_name = table_name.to_string();
        self.create_schema()?;
        Ok(self)
    }

    /// Replace the job id generator (UUID v4 by default)
    pub fn with_job_id_generator(
        mut self,
        generator: impl Fn() -> JobId + Send + Sync + 'static,
    ) -> Self {
        self.job_id_generator = Box::new(generator);
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Create the queue table and its indexes; safe to call repeatedly
    pub fn create_schema(&self) -> QueueResult<()> {
        let table = &self.table_name;
        let conn = self.conn()?;
        conn.execute_batch(&format!(
            r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    job_id TEXT NOT NULL,
                    uri_hash CHAR(64) NOT NULL,
                    uri TEXT NOT NULL,
                    found_on TEXT,
                    level INTEGER NOT NULL,
                    processed INTEGER NOT NULL DEFAULT 0,
                    tags TEXT
                );

                CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_job_uri
                    ON {table}(job_id, uri_hash);

                CREATE INDEX IF NOT EXISTS idx_{table}_processed
                    ON {table}(processed);

                CREATE INDEX IF NOT EXISTS idx_{table}_level
                    ON {table}(level);
                "#
        ))?;

        Ok(())
    }

    fn conn(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        Ok(self.conn.lock()?)
    }

    fn uri_hash(uri: &Url) -> String {
        sha256_hex(normalize_uri(uri.clone()).as_str())
    }

    fn upsert(conn: &Connection, table: &str, job_id: &str, crawl_uri: &CrawlUri) -> QueueResult<()> {
        let uri_hash = Self::uri_hash(crawl_uri.uri());

        let updated = conn.execute(
            &format!("UPDATE {table} SET processed = ?1, tags = ?2 WHERE job_id = ?3 AND uri_hash = ?4"),
            params![crawl_uri.is_processed(), crawl_uri.joined_tags(), job_id, uri_hash],
        )?;

        if updated == 0 {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (job_id, uri_hash, uri, found_on, level, processed, tags)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    job_id,
                    uri_hash,
                    crawl_uri.uri().as_str(),
                    crawl_uri.found_on().map(Url::as_str),
                    crawl_uri.level(),
                    crawl_uri.is_processed(),
                    crawl_uri.joined_tags(),
                ],
            )?;
        }

        Ok(())
    }
}

impl Queue for SqliteQueue {
    fn create_job_id(&self, base_uris: &BaseUriCollection) -> QueueResult<JobId> {
        let job_id = (self.job_id_generator)();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for uri in base_uris {
            Self::upsert(&tx, &self.table_name, &job_id, &CrawlUri::base(uri.clone()))?;
        }
        tx.commit()?;

        tracing::debug!(job_id = %job_id, base_uris = base_uris.len(), "Created SQLite job");
        Ok(job_id)
    }

    fn is_job_id_valid(&self, job_id: &str) -> QueueResult<bool> {
        let conn = self.conn()?;
        let exists = conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE job_id = ?1 LIMIT 1", self.table_name),
                params![job_id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        Ok(exists)
    }

    fn delete_job_id(&self, job_id: &str) -> QueueResult<()> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            &format!("DELETE FROM {} WHERE job_id = ?1", self.table_name),
            params![job_id],
        )?;

        tracing::debug!(job_id = %job_id, rows = deleted, "Deleted SQLite job");
        Ok(())
    }

    fn get_base_uris(&self, job_id: &str) -> QueueResult<BaseUriCollection> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT uri FROM {} WHERE job_id = ?1 AND level = 0 ORDER BY id",
            self.table_name
        ))?;

        let uris = stmt
            .query_map(params![job_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        uris.iter()
            .map(|uri| {
                parse_uri(uri).map_err(|source| QueueError::CorruptEntry {
                    job_id: job_id.to_string(),
                    source,
                })
            })
            .collect()
    }

    fn get(&self, job_id: &str, uri: &Url) -> QueueResult<Option<CrawlUri>> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                &format!(
                    "SELECT {} FROM {} WHERE job_id = ?1 AND uri_hash = ?2 LIMIT 1",
                    StoredRow::COLUMNS,
                    self.table_name
                ),
                params![job_id, Self::uri_hash(uri)],
                StoredRow::from_row,
            )
            .optional()?
        };

        row.map(|row| row.into_crawl_uri(job_id)).transpose()
    }

    fn add(&self, job_id: &str, crawl_uri: &CrawlUri) -> QueueResult<()> {
        let conn = self.conn()?;
        Self::upsert(&conn, &self.table_name, job_id, crawl_uri)
    }

    fn get_next(&self, job_id: &str, skip: usize) -> QueueResult<Option<CrawlUri>> {
        let offset = i64::try_from(skip).unwrap_or(i64::MAX);
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                &format!(
                    "SELECT {} FROM {} WHERE job_id = ?1 AND processed = 0 ORDER BY id LIMIT 1 OFFSET ?2",
                    StoredRow::COLUMNS,
                    self.table_name
                ),
                params![job_id, offset],
                StoredRow::from_row,
            )
            .optional()?
        };

        row.map(|row| row.into_crawl_uri(job_id)).transpose()
    }

    fn count_all(&self, job_id: &str) -> QueueResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE job_id = ?1", self.table_name),
            params![job_id],
            |row| row.get(0),
        )?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn count_pending(&self, job_id: &str) -> QueueResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE job_id = ?1 AND processed = 0",
                self.table_name
            ),
            params![job_id],
            |row| row.get(0),
        )?;

        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn get_all(&self, job_id: &str) -> QueueResult<Vec<CrawlUri>> {
        let rows = {
            let conn = self.conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM {} WHERE job_id = ?1 ORDER BY id",
                StoredRow::COLUMNS,
                self.table_name
            ))?;
            let rows = stmt
                .query_map(params![job_id], StoredRow::from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        rows.into_iter()
            .map(|row| row.into_crawl_uri(job_id))
            .collect()
    }
}
