use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Value, json};
use tracing::debug;

use super::schema::{RESET_ORDER, create_schema_sql};
use super::{StorageError, StorageGateway};
use crate::models::{NamespaceId, StatementBatch};

/// One SQLite database file per namespace under `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteGateway {
    root: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    pub columns: Vec<String>,
    pub rows: Vec<Value>,
    pub truncated: bool,
}

impl QueryRows {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl SqliteGateway {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn namespace_path(&self, namespace: &NamespaceId) -> PathBuf {
        self.root.join(format!("{}.sqlite", namespace.as_str()))
    }

    #[must_use]
    pub fn namespace_exists(&self, namespace: &NamespaceId) -> bool {
        self.namespace_path(namespace).is_file()
    }

    /// Runs one statement on a read-only connection and returns at most `row_cap` rows.
    ///
    /// Callers gate `sql` with [`crate::sql::is_select_only`] first; the read-only
    /// connection is the second line.
    pub async fn query_namespace(
        &self,
        namespace: &NamespaceId,
        sql: &str,
        row_cap: usize,
    ) -> Result<QueryRows, StorageError> {
        let path = self.existing_namespace_path(namespace)?;
        let sql = sql.to_string();
        run_blocking(move || {
            let connection =
                Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
            execute_read_only_query(&connection, &sql, row_cap)
        })
        .await
    }

    fn existing_namespace_path(&self, namespace: &NamespaceId) -> Result<PathBuf, StorageError> {
        let path = self.namespace_path(namespace);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StorageError::NamespaceMissing(namespace.clone()))
        }
    }
}

#[async_trait]
impl StorageGateway for SqliteGateway {
    async fn create_namespace(&self, namespace: &NamespaceId) -> Result<(), StorageError> {
        let path = self.namespace_path(namespace);
        if path.exists() {
            return Err(StorageError::NamespaceExists(namespace.clone()));
        }

        let root = self.root.clone();
        debug!(namespace = %namespace, path = %path.display(), "creating namespace");
        run_blocking(move || {
            std::fs::create_dir_all(&root)?;
            let result = open_namespace_connection(&path).and_then(|mut connection| {
                let tx = connection.transaction()?;
                tx.execute_batch(&create_schema_sql())?;
                tx.commit()?;
                Ok(())
            });
            if result.is_err() {
                let _ = std::fs::remove_file(&path);
            }
            result
        })
        .await
    }

    async fn execute_in_namespace(
        &self,
        namespace: &NamespaceId,
        batch: &StatementBatch,
    ) -> Result<(), StorageError> {
        let path = self.existing_namespace_path(namespace)?;
        let statements = batch.statements().to_vec();
        debug!(namespace = %namespace, statements = statements.len(), "executing batch");
        let cancelled = Arc::new(AtomicBool::new(false));
        let _cancel_on_drop = CancelOnDrop(Arc::clone(&cancelled));
        run_blocking(move || apply_batch(&path, &statements, &cancelled)).await
    }

    async fn reset_tables(&self, namespace: &NamespaceId) -> Result<(), StorageError> {
        let path = self.existing_namespace_path(namespace)?;
        debug!(namespace = %namespace, "resetting namespace tables");
        run_blocking(move || {
            let mut connection = open_namespace_connection(&path)?;
            let tx = connection.transaction()?;
            for table in RESET_ORDER {
                tx.execute(&format!("DELETE FROM {table}"), [])?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn drop_namespace(&self, namespace: &NamespaceId) -> Result<(), StorageError> {
        let path = self.namespace_path(namespace);
        debug!(namespace = %namespace, "dropping namespace");
        run_blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => Err(error.into()),
        })
        .await
    }
}

/// Flags the blocking task when the awaiting future is dropped, e.g. by a run deadline.
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// One transaction for the whole batch. A cancelled batch rolls back instead of committing.
fn apply_batch(
    path: &Path,
    statements: &[String],
    cancelled: &AtomicBool,
) -> Result<(), StorageError> {
    let mut connection = open_namespace_connection(path)?;
    let tx = connection.transaction()?;
    for (index, statement) in statements.iter().enumerate() {
        if cancelled.load(Ordering::SeqCst) {
            return Err(StorageError::Cancelled);
        }
        tx.execute_batch(statement)
            .map_err(|error| StorageError::Execution {
                index,
                statement: statement.clone(),
                message: error.to_string(),
            })?;
    }
    if cancelled.load(Ordering::SeqCst) {
        return Err(StorageError::Cancelled);
    }
    tx.commit()?;
    Ok(())
}

async fn run_blocking<T, F>(task: F) -> Result<T, StorageError>
where
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|error| StorageError::Task(error.to_string()))?
}

fn open_namespace_connection(path: &Path) -> Result<Connection, StorageError> {
    let connection = Connection::open(path)?;
    connection.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(connection)
}

fn execute_read_only_query(
    connection: &Connection,
    sql: &str,
    row_cap: usize,
) -> Result<QueryRows, StorageError> {
    let mut statement = connection.prepare(sql)?;
    let columns = statement
        .column_names()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut rows = statement.query([])?;
    let mut result_rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = rows.next()? {
        if result_rows.len() >= row_cap {
            truncated = true;
            break;
        }

        let mut record = serde_json::Map::new();
        for (index, column_name) in columns.iter().enumerate() {
            let value = row.get::<usize, SqlValue>(index)?;
            record.insert(column_name.clone(), json_value_from_sql(value));
        }
        result_rows.push(Value::Object(record));
    }

    Ok(QueryRows {
        columns,
        rows: result_rows,
        truncated,
    })
}

fn json_value_from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(encode_blob_hex(&value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use rusqlite::types::Value as SqlValue;
    use serde_json::json;

    use super::{CancelOnDrop, apply_batch, json_value_from_sql, open_namespace_connection};
    use crate::storage::StorageError;
    use crate::storage::schema::create_schema_sql;

    fn scratch_database(prefix: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time should be after unix epoch")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("{prefix}-{nanos}"));
        std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
        let path = dir.join("scratch.sqlite");
        open_namespace_connection(&path)
            .expect("scratch database should open")
            .execute_batch(&create_schema_sql())
            .expect("schema should apply");
        path
    }

    fn victim_count(path: &std::path::Path) -> i64 {
        open_namespace_connection(path)
            .expect("scratch database should open")
            .query_row("SELECT COUNT(*) FROM Victim", [], |row| row.get(0))
            .expect("count should run")
    }

    #[test]
    fn dropping_the_guard_flags_cancellation() {
        let cancelled = Arc::new(AtomicBool::new(false));
        drop(CancelOnDrop(Arc::clone(&cancelled)));
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn cancelled_batch_rolls_back_instead_of_committing() {
        let path = scratch_database("queryhunt-cancelled-batch");
        let statements = vec!["INSERT INTO Victim (victim_id, name) VALUES (1, 'Ada');".to_string()];

        let error = apply_batch(&path, &statements, &AtomicBool::new(true))
            .expect_err("cancelled batch must not commit");
        assert!(matches!(error, StorageError::Cancelled));
        assert_eq!(victim_count(&path), 0);

        apply_batch(&path, &statements, &AtomicBool::new(false)).expect("batch should commit");
        assert_eq!(victim_count(&path), 1);

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn sql_values_map_to_json() {
        assert_eq!(json_value_from_sql(SqlValue::Null), json!(null));
        assert_eq!(json_value_from_sql(SqlValue::Integer(7)), json!(7));
        assert_eq!(
            json_value_from_sql(SqlValue::Text("Ada".to_string())),
            json!("Ada")
        );
        assert_eq!(
            json_value_from_sql(SqlValue::Blob(vec![0x0f, 0xa0])),
            json!("0fa0")
        );
    }
}
