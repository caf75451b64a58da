//! SQLite database backend implementation
//!
//! Queries come back as a [`RecordSet`]. Declared field types follow SQLite's column type
//! affinity rules applied to each result column's declared type; expression columns with no
//! declaration are typed `object` and carry the type of their first non-null value as the
//! provider-specific type.

use crate::core::database::Database;
use crate::core::error::{MappingError, Result};
use crate::core::field_type::FieldType;
use crate::core::record::Column;
use crate::core::record_set::RecordSet;
use crate::core::value::DatabaseValue;
use async_trait::async_trait;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default timeout for database operations (30 seconds)
const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration of a [`SqliteDatabase`]
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// SQLite connection string (a path or `:memory:`)
    pub connection_string: String,
    /// Timeout for database operations (connect, query, execute)
    pub operation_timeout: Duration,
    /// Whether to enforce foreign key constraints
    pub foreign_keys: bool,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            connection_string: ":memory:".to_string(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
            foreign_keys: true,
        }
    }
}

impl SqliteConfig {
    /// Create a configuration for `connection_string`
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Default::default()
        }
    }

    /// Set database operation timeout
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Enable or disable foreign key enforcement
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }
}

/// SQLite database implementation
///
/// # Example
///
/// ```no_run
/// use rust_record_mapper::prelude::*;
///
/// #[derive(Default)]
/// struct User {
///     id: i64,
///     name: String,
/// }
///
/// rust_record_mapper::impl_mappable!(User { id: "id", name: "name" });
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let db = SqliteDatabase::new(SqliteConfig::new(":memory:"));
///     db.connect().await?;
///     db.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").await?;
///     db.execute("INSERT INTO users (name) VALUES ('Alice')").await?;
///
///     let records = db.query("SELECT id, name FROM users").await?;
///     for user in ObjectReader::for_reader(records).read::<User>()? {
///         println!("{}", user?.name);
///     }
///     Ok(())
/// }
/// ```
pub struct SqliteDatabase {
    config: SqliteConfig,
    connection: Arc<Mutex<Option<Connection>>>,
}

impl SqliteDatabase {
    /// Create a new, unconnected SQLite database instance
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            connection: Arc::new(Mutex::new(None)),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Run `f` against the open connection on the blocking pool, bounded by the
    /// operation timeout
    async fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let connection_arc = Arc::clone(&self.connection);
        let timeout = self.config.operation_timeout;

        let mut task = tokio::task::spawn_blocking(move || -> Result<T> {
            let connection = connection_arc.blocking_lock();
            let conn = connection
                .as_ref()
                .ok_or_else(|| MappingError::connection("Not connected to database"))?;
            f(conn)
        });

        // Abort the task on timeout so it does not hold the connection
        tokio::select! {
            result = &mut task => {
                result.map_err(|e| MappingError::other(format!("Task join error: {}", e)))?
            }
            _ = tokio::time::sleep(timeout) => {
                task.abort();
                Err(MappingError::query_timeout(timeout.as_millis() as u64))
            }
        }
    }
}

impl Default for SqliteDatabase {
    fn default() -> Self {
        Self::new(SqliteConfig::default())
    }
}

/// Declared field type for a SQLite column declaration, by type affinity
pub fn field_type_for_declaration(declared: Option<&str>) -> FieldType {
    let Some(declared) = declared else {
        return FieldType::Object;
    };
    let declared = declared.to_ascii_uppercase();
    if declared.contains("BOOL") {
        FieldType::Bool
    } else if declared.contains("INT") {
        FieldType::Long
    } else if declared.contains("CHAR") || declared.contains("CLOB") || declared.contains("TEXT")
    {
        FieldType::String
    } else if declared.contains("BLOB") {
        FieldType::Bytes
    } else if declared.contains("REAL") || declared.contains("FLOA") || declared.contains("DOUB")
    {
        FieldType::Double
    } else {
        FieldType::Object
    }
}

fn read_value(value: ValueRef<'_>, field_type: FieldType) -> DatabaseValue {
    match (value, field_type) {
        (ValueRef::Null, _) => DatabaseValue::Null,
        (ValueRef::Integer(v), FieldType::Bool) => DatabaseValue::Bool(v != 0),
        (ValueRef::Integer(v), FieldType::Double) => DatabaseValue::Double(v as f64),
        (ValueRef::Integer(v), _) => DatabaseValue::Long(v),
        (ValueRef::Real(v), _) => DatabaseValue::Double(v),
        (ValueRef::Text(v), _) => DatabaseValue::String(String::from_utf8_lossy(v).to_string()),
        (ValueRef::Blob(v), _) => DatabaseValue::Bytes(v.to_vec()),
    }
}

fn to_sql_value(value: &DatabaseValue) -> Value {
    match value {
        DatabaseValue::Null => Value::Null,
        DatabaseValue::Bool(v) => Value::Integer(*v as i64),
        DatabaseValue::Byte(v) => Value::Integer(*v as i64),
        DatabaseValue::Short(v) => Value::Integer(*v as i64),
        DatabaseValue::Int(v) => Value::Integer(*v as i64),
        DatabaseValue::Long(v) | DatabaseValue::Timestamp(v) => Value::Integer(*v),
        DatabaseValue::Float(v) => Value::Real(*v as f64),
        DatabaseValue::Double(v) => Value::Real(*v),
        DatabaseValue::String(v) => Value::Text(v.clone()),
        DatabaseValue::Bytes(v) => Value::Blob(v.clone()),
    }
}

/// Run a query and collect it into a [`RecordSet`]
///
/// Columns without a declared type are `object`, with the type of their first non-null
/// value as the provider-specific type. That type depends on the returned rows, so the
/// same query can yield different schemas (and converter cache keys) for different data;
/// a column that is null in every row gets no provider-specific type.
fn query_records(conn: &Connection, sql: &str, params: &[Value]) -> Result<RecordSet> {
    let mut stmt = conn.prepare(sql)?;
    let declared: Vec<(String, FieldType)> = stmt
        .columns()
        .iter()
        .map(|column| {
            (
                column.name().to_string(),
                field_type_for_declaration(column.decl_type()),
            )
        })
        .collect();

    let mut rows = Vec::new();
    let mut query = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = query.next()? {
        let values = declared
            .iter()
            .enumerate()
            .map(|(i, (_, field_type))| -> Result<DatabaseValue> {
                Ok(read_value(row.get_ref(i)?, *field_type))
            })
            .collect::<Result<Vec<_>>>()?;
        rows.push(values);
    }

    let columns: Vec<Column> = declared
        .into_iter()
        .enumerate()
        .map(|(i, (name, field_type))| {
            let column = Column::nullable(name, field_type);
            if field_type != FieldType::Object {
                return column;
            }
            match rows.iter().find_map(|row| row[i].field_type()) {
                Some(observed) => column.with_provider_specific_type(observed),
                None => column,
            }
        })
        .collect();

    let mut records = RecordSet::new(columns);
    for row in rows {
        records.push_row(row)?;
    }
    Ok(records)
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn connect(&self) -> Result<()> {
        {
            let mut connection = self.connection.lock().await;
            *connection = None;
        }

        let connection_string = self.config.connection_string.clone();
        let foreign_keys = self.config.foreign_keys;
        let connection_arc = Arc::clone(&self.connection);
        let timeout = self.config.operation_timeout;
        tracing::debug!(connection_string = %connection_string, "opening sqlite connection");

        let mut task = tokio::task::spawn_blocking(move || -> Result<()> {
            let conn = Connection::open(&connection_string)?;
            if foreign_keys {
                conn.execute("PRAGMA foreign_keys = ON", [])?;
            }

            let mut connection = connection_arc.blocking_lock();
            *connection = Some(conn);
            Ok(())
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| MappingError::other(format!("Task join error: {}", e)))?
            }
            _ = tokio::time::sleep(timeout) => {
                task.abort();
                Err(MappingError::query_timeout(timeout.as_millis() as u64))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .try_lock()
            .map(|conn| conn.is_some())
            .unwrap_or(false)
    }

    async fn disconnect(&self) -> Result<()> {
        let mut connection = self.connection.lock().await;
        *connection = None;
        tracing::debug!("sqlite connection closed");
        Ok(())
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.execute_with_params(sql, &[]).await
    }

    async fn execute_with_params(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64> {
        let sql = sql.to_string();
        let params: Vec<Value> = params.iter().map(to_sql_value).collect();
        let affected = self
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                Ok(stmt.execute(params_from_iter(params.iter()))? as u64)
            })
            .await?;
        tracing::trace!(affected, "sqlite statement executed");
        Ok(affected)
    }

    async fn query_with_params(&self, sql: &str, params: &[DatabaseValue]) -> Result<RecordSet> {
        let owned_sql = sql.to_string();
        let params: Vec<Value> = params.iter().map(to_sql_value).collect();
        let records = self
            .with_connection(move |conn| query_records(conn, &owned_sql, &params))
            .await?;
        tracing::debug!(sql = %sql, rows = records.len(), "sqlite query completed");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{DataReader, DataRecord, RecordSchema};

    async fn connected() -> Result<SqliteDatabase> {
        let db = SqliteDatabase::default();
        db.connect().await?;
        Ok(db)
    }

    #[test]
    fn test_field_type_for_declaration() {
        assert_eq!(field_type_for_declaration(Some("INTEGER")), FieldType::Long);
        assert_eq!(field_type_for_declaration(Some("bigint")), FieldType::Long);
        assert_eq!(field_type_for_declaration(Some("VARCHAR(20)")), FieldType::String);
        assert_eq!(field_type_for_declaration(Some("BLOB")), FieldType::Bytes);
        assert_eq!(field_type_for_declaration(Some("DOUBLE PRECISION")), FieldType::Double);
        assert_eq!(field_type_for_declaration(Some("BOOLEAN")), FieldType::Bool);
        assert_eq!(field_type_for_declaration(Some("NUMERIC")), FieldType::Object);
        assert_eq!(field_type_for_declaration(None), FieldType::Object);
    }

    #[test]
    fn test_config_builder() {
        let config = SqliteConfig::new("app.db")
            .with_operation_timeout(Duration::from_secs(5))
            .with_foreign_keys(false);
        assert_eq!(config.connection_string, "app.db");
        assert_eq!(config.operation_timeout, Duration::from_secs(5));
        assert!(!config.foreign_keys);
    }

    #[tokio::test]
    async fn test_sqlite_connect() {
        let db = SqliteDatabase::default();
        assert!(db.connect().await.is_ok());
        assert!(db.is_connected());
        assert!(db.disconnect().await.is_ok());
        assert!(!db.is_connected());
    }

    #[test]
    fn test_execute_outside_async_context() {
        let db = SqliteDatabase::default();
        let affected = tokio_test::block_on(async {
            db.connect().await?;
            db.execute("CREATE TABLE t (id INTEGER)").await?;
            db.execute("INSERT INTO t VALUES (1), (2)").await
        })
        .unwrap();
        assert_eq!(affected, 2);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let db = SqliteDatabase::default();
        let err = db.execute("SELECT 1").await.unwrap_err();
        assert!(matches!(err, MappingError::ConnectionError(_)));
    }

    #[tokio::test]
    async fn test_query_declared_types() -> Result<()> {
        let db = connected().await?;
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, active BOOLEAN, data BLOB)")
            .await?;
        let affected = db
            .execute_with_params(
                "INSERT INTO test (name, active, data) VALUES (?, ?, ?)",
                &[
                    DatabaseValue::from("Alice"),
                    DatabaseValue::Bool(true),
                    DatabaseValue::Bytes(vec![1, 2]),
                ],
            )
            .await?;
        assert_eq!(affected, 1);

        let mut records = db.query("SELECT id, name, active, data FROM test").await?;
        assert_eq!(records.field_type(0), FieldType::Long);
        assert_eq!(records.field_type(1), FieldType::String);
        assert_eq!(records.field_type(2), FieldType::Bool);
        assert_eq!(records.field_type(3), FieldType::Bytes);
        assert!(records.is_nullable(1));

        assert!(records.advance()?);
        assert_eq!(records.value(0), &DatabaseValue::Long(1));
        assert_eq!(records.value(2), &DatabaseValue::Bool(true));
        assert!(!records.advance()?);
        Ok(())
    }

    #[tokio::test]
    async fn test_expression_columns_use_observed_type() -> Result<()> {
        let db = connected().await?;
        db.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)").await?;
        db.execute("INSERT INTO test DEFAULT VALUES").await?;

        let records = db
            .query_with_params("SELECT COUNT(*) AS total FROM test WHERE id > ?", &[0.into()])
            .await?;
        assert_eq!(records.field_type(0), FieldType::Object);
        assert_eq!(records.provider_specific_field_type(0), Some(FieldType::Long));

        let records = db.query("SELECT NULL AS nothing").await?;
        assert_eq!(records.field_type(0), FieldType::Object);
        assert_eq!(records.provider_specific_field_type(0), None);
        Ok(())
    }
}
