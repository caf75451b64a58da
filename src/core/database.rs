//! Database trait
//!
//! Backends execute SQL and hand back query results as a [`RecordSet`], ready to be read
//! through converters.

use super::error::Result;
use super::record_set::RecordSet;
use super::value::DatabaseValue;
use async_trait::async_trait;

/// A SQL database producing record sets
#[async_trait]
pub trait Database: Send + Sync {
    /// Open the connection
    async fn connect(&self) -> Result<()>;

    /// Check if connected to the database
    fn is_connected(&self) -> bool;

    /// Close the connection
    async fn disconnect(&self) -> Result<()>;

    /// Execute a statement that doesn't return rows, returning the affected row count
    ///
    /// # Security Warning
    ///
    /// **SQL Injection Risk**: This method executes raw SQL without parameter sanitization.
    /// Use [`execute_with_params`](Self::execute_with_params) for anything built from input.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute a parameterized statement that doesn't return rows
    async fn execute_with_params(&self, sql: &str, params: &[DatabaseValue]) -> Result<u64>;

    /// Run a query and collect its rows
    ///
    /// # Security Warning
    ///
    /// **SQL Injection Risk**: This method executes raw SQL without parameter sanitization.
    /// Use [`query_with_params`](Self::query_with_params) for anything built from input.
    async fn query(&self, sql: &str) -> Result<RecordSet> {
        self.query_with_params(sql, &[]).await
    }

    /// Run a parameterized query and collect its rows
    async fn query_with_params(&self, sql: &str, params: &[DatabaseValue]) -> Result<RecordSet>;
}
