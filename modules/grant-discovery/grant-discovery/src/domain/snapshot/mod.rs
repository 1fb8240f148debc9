//! Disposable relational session holding one privilege snapshot.
//!
//! Each run starts its own [`SnapshotStore`]: a private directory with a
//! main SQLite database plus one attached database per source schema, so
//! probe SQL can address `mysql.user` or `information_schema.TABLE_PRIVILEGES`
//! verbatim. The store is exclusively owned by the run and must be closed on
//! every exit path.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tempfile::TempDir;
use tracing::{debug, info, warn};

pub mod payload;
pub mod schema;

pub use payload::{SnapshotRow, SnapshotTables};

/// Normalized scalar for "no row" or SQL NULL.
pub const NULL_LITERAL: &str = "NULL";

#[derive(Debug, Clone, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot store not reachable within {}ms", .0.as_millis())]
    StartupTimeout(Duration),

    #[error("failed to provision snapshot store: {0}")]
    Provision(String),

    #[error("query failed: {0}")]
    QueryFailed(String),

    #[error("snapshot store is closed")]
    Closed,
}

/// Query capability the evaluator needs from a snapshot.
#[async_trait]
pub trait SnapshotQuerier: Send + Sync {
    /// First-row/first-column scalar of `sql`, `"NULL"` when absent.
    async fn probe(&self, sql: &str) -> Result<String, SnapshotError>;
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub tables_loaded: usize,
    pub tables_skipped: Vec<String>,
    pub rows_inserted: usize,
    pub rows_failed: usize,
}

pub struct SnapshotStore {
    pool: SqlitePool,
    dir: Mutex<Option<TempDir>>,
    closed: AtomicBool,
}

impl SnapshotStore {
    /// Provision the fixed schema and wait until the engine answers.
    ///
    /// # Errors
    ///
    /// - [`SnapshotError::StartupTimeout`] if the engine is not reachable within `startup_timeout`
    /// - [`SnapshotError::Provision`] if the directory, pool or schema cannot be created
    pub async fn start(pool_size: u32, startup_timeout: Duration) -> Result<Self, SnapshotError> {
        let dir = tempfile::Builder::new()
            .prefix("grant-snapshot-")
            .tempdir()
            .map_err(|e| SnapshotError::Provision(e.to_string()))?;

        let pool = tokio::time::timeout(startup_timeout, provision(dir.path(), pool_size))
            .await
            .map_err(|_| SnapshotError::StartupTimeout(startup_timeout))??;

        info!(endpoint = %dir.path().display(), "Snapshot store started");

        Ok(Self {
            pool,
            dir: Mutex::new(Some(dir)),
            closed: AtomicBool::new(false),
        })
    }

    /// Insert snapshot rows table by table.
    ///
    /// Unknown tables and failing rows are logged and skipped; a load never
    /// aborts as a whole.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Closed`] if the store was already closed.
    pub async fn load(&self, tables: &SnapshotTables) -> Result<LoadReport, SnapshotError> {
        self.ensure_open()?;
        let mut report = LoadReport::default();

        for (key, rows) in tables.tables() {
            let Some(table) = schema::lookup(key) else {
                warn!(table = key, rows = rows.len(), "Skipping unknown snapshot table");
                report.tables_skipped.push(key.to_owned());
                continue;
            };

            match self.load_table(table, rows).await {
                Ok((inserted, failed)) => {
                    report.tables_loaded += 1;
                    report.rows_inserted += inserted;
                    report.rows_failed += failed;
                }
                Err(e) => {
                    warn!(table = key, error = %e, "Snapshot table load failed");
                    report.tables_skipped.push(key.to_owned());
                }
            }
        }

        info!(
            tables_loaded = report.tables_loaded,
            tables_skipped = report.tables_skipped.len(),
            rows_inserted = report.rows_inserted,
            rows_failed = report.rows_failed,
            "Snapshot loaded"
        );
        Ok(report)
    }

    async fn load_table(
        &self,
        table: &schema::PrivilegeTable,
        rows: &[SnapshotRow],
    ) -> Result<(usize, usize), sqlx::Error> {
        let insert = table.insert_sql();
        let width = table.columns.len();
        let mut tx = self.pool.begin().await?;
        let (mut inserted, mut failed) = (0, 0);

        for (idx, row) in rows.iter().enumerate() {
            if row.len() != width {
                debug!(
                    table = %table.key(),
                    row = idx,
                    got = row.len(),
                    expected = width,
                    "Row width differs from schema; padding or truncating"
                );
            }

            let mut query = sqlx::query(&insert);
            for col in 0..width {
                query = query.bind(row.get(col).cloned().flatten());
            }

            match query.execute(&mut *tx).await {
                Ok(_) => inserted += 1,
                Err(e) => {
                    warn!(table = %table.key(), row = idx, error = %e, "Skipping snapshot row");
                    failed += 1;
                }
            }
        }

        tx.commit().await?;
        Ok((inserted, failed))
    }

    /// Run one statement and return all rows as text cells.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::QueryFailed`] on any execution error; callers
    /// treat it as "no decision" and never retry.
    pub async fn execute(&self, sql: &str) -> Result<Vec<SnapshotRow>, SnapshotError> {
        self.ensure_open()?;
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| SnapshotError::QueryFailed(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|row| (0..row.columns().len()).map(|i| cell_text(row, i)).collect())
            .collect())
    }

    /// Tear down the pool and remove the backing directory. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close().await;

        let dir = self.dir.lock().take();
        if let Some(dir) = dir {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!(endpoint = %path.display(), error = %e, "Failed to remove snapshot directory");
            }
        }
        info!("Snapshot store closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), SnapshotError> {
        if self.is_closed() {
            return Err(SnapshotError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl SnapshotQuerier for SnapshotStore {
    async fn probe(&self, sql: &str) -> Result<String, SnapshotError> {
        self.ensure_open()?;
        let row = sqlx::query(sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SnapshotError::QueryFailed(e.to_string()))?;

        Ok(row
            .filter(|r| !r.columns().is_empty())
            .and_then(|r| cell_text(&r, 0))
            .unwrap_or_else(|| NULL_LITERAL.to_owned()))
    }
}

async fn provision(dir: &Path, pool_size: u32) -> Result<SqlitePool, SnapshotError> {
    let attach: Arc<[String]> = schema::SOURCE_SCHEMAS
        .iter()
        .map(|name| {
            let file = dir.join(format!("{name}.db"));
            format!(
                "ATTACH DATABASE {} AS {}",
                quote_literal(&file.to_string_lossy()),
                escape_identifier(name)
            )
        })
        .collect();

    let options = SqliteConnectOptions::new()
        .filename(dir.join("main.db"))
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size.max(1))
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .after_connect(move |conn, _meta| {
            let attach = Arc::clone(&attach);
            Box::pin(async move {
                for stmt in attach.iter() {
                    sqlx::query(stmt).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect_with(options)
        .await
        .map_err(|e| SnapshotError::Provision(e.to_string()))?;

    for table in schema::TABLES {
        sqlx::query(&table.create_sql())
            .execute(&pool)
            .await
            .map_err(|e| SnapshotError::Provision(format!("{}: {e}", table.key())))?;
    }

    sqlx::query("SELECT 1")
        .fetch_one(&pool)
        .await
        .map_err(|e| SnapshotError::Provision(e.to_string()))?;

    Ok(pool)
}

/// Render one cell as text regardless of its runtime storage class.
fn cell_text(row: &SqliteRow, idx: usize) -> Option<String> {
    if let Ok(text) = row.try_get::<Option<String>, _>(idx) {
        return text;
    }
    if let Ok(int) = row.try_get::<Option<i64>, _>(idx) {
        return int.map(|n| n.to_string());
    }
    if let Ok(real) = row.try_get::<Option<f64>, _>(idx) {
        return real.map(|n| n.to_string());
    }
    row.try_get::<Option<Vec<u8>>, _>(idx)
        .ok()
        .flatten()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// Escape a value for use inside a single-quoted SQL literal.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[must_use]
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_literal(value))
}

#[must_use]
pub fn escape_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    async fn started() -> SnapshotStore {
        SnapshotStore::start(2, Duration::from_secs(5)).await.unwrap()
    }

    fn user_row(host: &str, user: &str, super_priv: &str) -> String {
        let mut cells = vec![format!("\"{host}\""), format!("\"{user}\"")];
        cells.extend((2..17).map(|_| "\"N\"".to_owned()));
        cells.push(format!("\"{super_priv}\""));
        format!("[{}]", cells.join(","))
    }

    #[tokio::test]
    async fn probe_returns_first_scalar_or_null() {
        let store = started().await;
        let payload = format!(
            r#"[{{"query_key": "mysql.user[0]", "status": true, "result": [{}]}}]"#,
            user_row("%", "alice", "Y")
        );
        store
            .load(&SnapshotTables::decode(&payload).unwrap())
            .await
            .unwrap();

        let hit = store
            .probe("SELECT Super_priv FROM mysql.user WHERE User = 'alice'")
            .await
            .unwrap();
        assert_eq!(hit, "Y");

        let miss = store
            .probe("SELECT Super_priv FROM mysql.user WHERE User = 'nobody'")
            .await
            .unwrap();
        assert_eq!(miss, NULL_LITERAL);

        let count = store
            .probe("SELECT COUNT(*) FROM mysql.user")
            .await
            .unwrap();
        assert_eq!(count, "1");

        store.close().await;
    }

    #[tokio::test]
    async fn quotes_in_values_survive_load_and_match_escaped_probe() {
        let store = started().await;
        let payload = format!(
            r#"[{{"query_key": "mysql.user", "status": true, "result": [{}]}}]"#,
            user_row("%", "o'brien", "N")
        );
        let report = store
            .load(&SnapshotTables::decode(&payload).unwrap())
            .await
            .unwrap();
        assert_eq!(report.rows_inserted, 1);
        assert_eq!(report.rows_failed, 0);

        let sql = format!(
            "SELECT User FROM mysql.user WHERE User = {}",
            quote_literal("o'brien")
        );
        assert_eq!(store.probe(&sql).await.unwrap(), "o'brien");
        store.close().await;
    }

    #[tokio::test]
    async fn unknown_tables_are_skipped_without_failing_the_load() {
        let store = started().await;
        let tables = SnapshotTables::decode(
            r#"[
                {"query_key": "mysql.not_a_table", "status": true, "result": [["x"]]},
                {"query_key": "mysql.global_grants", "status": true, "result": [["bob", "%", "SYSTEM_USER", "N"]]}
            ]"#,
        )
        .unwrap();

        let report = store.load(&tables).await.unwrap();
        assert_eq!(report.tables_loaded, 1);
        assert_eq!(report.tables_skipped, vec!["mysql.not_a_table".to_owned()]);
        assert_eq!(report.rows_inserted, 1);
        store.close().await;
    }

    #[tokio::test]
    async fn short_rows_are_padded_with_null() {
        let store = started().await;
        let tables = SnapshotTables::decode(
            r#"[{"query_key": "information_schema.USER_PRIVILEGES", "status": true, "result": [["'carol'@'%'"]]}]"#,
        )
        .unwrap();
        store.load(&tables).await.unwrap();

        let rows = store
            .execute("SELECT GRANTEE, PRIVILEGE_TYPE FROM information_schema.USER_PRIVILEGES")
            .await
            .unwrap();
        assert_eq!(rows, vec![vec![Some("'carol'@'%'".to_owned()), None]]);
        store.close().await;
    }

    #[tokio::test]
    async fn failing_query_is_reported_not_panicking() {
        let store = started().await;
        let err = store.probe("SELECT * FROM mysql.missing").await.unwrap_err();
        assert!(matches!(err, SnapshotError::QueryFailed(_)));
        store.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent_and_blocks_further_queries() {
        let store = started().await;
        store.close().await;
        store.close().await;
        assert!(store.is_closed());
        assert!(matches!(
            store.probe("SELECT 1").await,
            Err(SnapshotError::Closed)
        ));
    }

    #[tokio::test]
    async fn startup_bound_is_enforced() {
        let result = SnapshotStore::start(1, Duration::ZERO).await;
        assert!(matches!(result, Err(SnapshotError::StartupTimeout(_))));
    }
}
