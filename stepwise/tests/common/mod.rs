use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use stepwise::{
    ColumnDefault, ColumnDescriptor, Context, IndexDescriptor, MigrateError, Result, Step,
    TableDescriptor,
};

pub async fn create_sqlite_pool(key: &str) -> anyhow::Result<SqlitePool> {
    let path = format!("{}/stepwise_{key}.db", env!("CARGO_TARGET_TMPDIR"));
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path}{suffix}"));
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))?.create_if_missing(true);

    Ok(SqlitePoolOptions::new().connect_with(options).await?)
}

pub async fn count(pool: &SqlitePool, sql: &str) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await?;

    Ok(count)
}

pub async fn table_exists(pool: &SqlitePool, table: &str) -> anyhow::Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '{table}'");

    Ok(count(pool, &sql).await? > 0)
}

pub async fn index_exists(pool: &SqlitePool, index: &str) -> anyhow::Result<bool> {
    let sql = format!("SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = '{index}'");

    Ok(count(pool, &sql).await? > 0)
}

pub async fn history(pool: &SqlitePool, table: &str) -> anyhow::Result<Vec<String>> {
    let rows: Vec<(String,)> =
        sqlx::query_as(&format!("SELECT version FROM {table} ORDER BY CAST(version AS INTEGER)"))
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(version,)| version).collect())
}

pub fn users_table() -> TableDescriptor {
    TableDescriptor::new("users")
        .primary_key_column(ColumnDescriptor::varchar("uuid", 40))
        .column(ColumnDescriptor::varchar("login", 255).not_null())
        .column(ColumnDescriptor::varchar("email", 100))
        .column(
            ColumnDescriptor::boolean("active")
                .not_null()
                .default_value(ColumnDefault::Bool(true)),
        )
        .column(ColumnDescriptor::big_integer("created_at").not_null())
}

pub struct CreateUsersTable;

#[async_trait]
impl Step for CreateUsersTable {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_table_if_missing(&users_table()).await?;

        Ok(())
    }
}

pub struct CreateUsersEmailIndex;

#[async_trait]
impl Step for CreateUsersEmailIndex {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_index_if_missing(
            &IndexDescriptor::new("users", "users_email")
                .column("email")
                .unique(true),
        )
        .await?;

        Ok(())
    }
}

pub struct CreateXsrfTokensTable;

#[async_trait]
impl Step for CreateXsrfTokensTable {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_table_if_missing(
            &TableDescriptor::new("xsrf_tokens")
                .primary_key_column(ColumnDescriptor::varchar("id", 40))
                .column(ColumnDescriptor::varchar("user_uuid", 40).not_null())
                .column(ColumnDescriptor::big_integer("created_at").not_null()),
        )
        .await?;

        Ok(())
    }
}

/// Fails with a database error while the switch is on.
#[derive(Clone, Default)]
pub struct Flaky {
    failing: Arc<AtomicBool>,
}

impl Flaky {
    pub fn failing() -> Self {
        let flaky = Self::default();
        flaky.failing.store(true, Ordering::SeqCst);
        flaky
    }

    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Step for Flaky {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            ctx.execute_sql("SELECT * FROM no_such_table").await?;
        }

        ctx.add_columns_if_missing("users", &[ColumnDescriptor::big_integer("last_connection_date")])
            .await?;

        Ok(())
    }
}

/// Succeeds only if `previous` is already recorded in the history table.
pub struct RequiresRecorded {
    pub previous: &'static str,
}

#[async_trait]
impl Step for RequiresRecorded {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        let recorded = ctx
            .session()
            .fetch_count(&format!(
                "SELECT COUNT(*) FROM schema_migrations WHERE version = '{}'",
                self.previous
            ))
            .await?;

        if recorded != 1 {
            return Err(MigrateError::SchemaConflict {
                object: "schema_migrations".to_owned(),
                detail: format!("version {} not recorded yet", self.previous),
            });
        }

        Ok(())
    }
}
