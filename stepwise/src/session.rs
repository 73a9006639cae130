use async_trait::async_trait;
use sqlx::{pool::PoolConnection, Database};

use crate::error::Result;

/// The narrow database surface the engine works through.
///
/// Statements are passed as fully rendered SQL. Everything built on top of a
/// session (introspection, DDL, history) stays dialect-neutral and
/// non-generic.
#[async_trait]
pub trait Session: Send {
    /// Executes a statement that returns no rows.
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Runs a query whose first column of the single row is an integer count.
    async fn fetch_count(&mut self, sql: &str) -> Result<i64>;

    /// Runs a query and collects its first column as strings.
    async fn fetch_strings(&mut self, sql: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<DB> Session for PoolConnection<DB>
where
    DB: Database,
    for<'c> &'c mut DB::Connection: sqlx::Executor<'c, Database = DB>,
    for<'q> DB::Arguments<'q>: sqlx::IntoArguments<'q, DB>,
    i64: for<'r> sqlx::Decode<'r, DB> + sqlx::Type<DB>,
    String: for<'r> sqlx::Decode<'r, DB> + sqlx::Type<DB>,
    usize: sqlx::ColumnIndex<DB::Row>,
{
    async fn execute(&mut self, sql: &str) -> Result<()> {
        tracing::debug!(sql, "execute");
        sqlx::query(sql).execute(&mut **self).await?;

        Ok(())
    }

    async fn fetch_count(&mut self, sql: &str) -> Result<i64> {
        tracing::trace!(sql, "fetch count");
        let (count,) = sqlx::query_as::<DB, (i64,)>(sql)
            .fetch_one(&mut **self)
            .await?;

        Ok(count)
    }

    async fn fetch_strings(&mut self, sql: &str) -> Result<Vec<String>> {
        tracing::trace!(sql, "fetch strings");
        let rows = sqlx::query_as::<DB, (String,)>(sql)
            .fetch_all(&mut **self)
            .await?;

        Ok(rows.into_iter().map(|(value,)| value).collect())
    }
}
