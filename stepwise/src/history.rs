//! The history table: the durable record of which versions completed.

use std::collections::BTreeSet;

use chrono::Utc;
use sea_query::{Alias, Expr, ExprTrait, Query, Value};

use crate::{
    descriptor::{ColumnDescriptor, TableDescriptor},
    dialect::render,
    error::{MigrateError, Result},
    registry::Version,
    step::Context,
};

const VERSION_COLUMN: &str = "version";
const STATUS_COLUMN: &str = "status";
const COMPLETED_AT_COLUMN: &str = "completed_at";

/// Status stored alongside a version. Only completed steps are recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStatus {
    Succeeded,
}

impl HistoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "SUCCEEDED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    table: String,
}

impl HistoryStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn descriptor(&self) -> TableDescriptor {
        TableDescriptor::new(&self.table)
            .primary_key_column(ColumnDescriptor::varchar(VERSION_COLUMN, 40))
            .column(ColumnDescriptor::varchar(STATUS_COLUMN, 16).not_null())
            .column(ColumnDescriptor::big_integer(COMPLETED_AT_COLUMN).not_null())
    }

    /// Creates the history table if it does not exist yet.
    pub async fn ensure(&self, ctx: &mut Context<'_>) -> Result<()> {
        if ctx.create_table_if_missing(&self.descriptor()).await? {
            tracing::info!(table = %self.table, "created migration history table");
        }

        Ok(())
    }

    /// Versions recorded as completed. Empty when the table does not exist.
    pub async fn completed_versions(&self, ctx: &mut Context<'_>) -> Result<BTreeSet<Version>> {
        if !ctx.introspector().table_exists(&self.table).await? {
            return Ok(BTreeSet::new());
        }

        let statement = Query::select()
            .column(Alias::new(VERSION_COLUMN.to_owned()))
            .from(Alias::new(self.table.clone()))
            .and_where(
                Expr::col(Alias::new(STATUS_COLUMN.to_owned()))
                    .eq(HistoryStatus::Succeeded.as_str()),
            )
            .to_owned();
        let sql = render!(ctx.dialect(), statement);

        ctx.session()
            .fetch_strings(&sql)
            .await?
            .into_iter()
            .map(|raw| {
                raw.parse::<Version>().map_err(|err| {
                    MigrateError::InvalidHistory(format!(
                        "table '{}': version '{raw}' is not a version number: {err}",
                        self.table
                    ))
                })
            })
            .collect()
    }

    /// Records `version` as completed, stamped with the current time.
    pub async fn record_completed(&self, ctx: &mut Context<'_>, version: Version) -> Result<()> {
        let mut statement = Query::insert();
        statement
            .into_table(Alias::new(self.table.clone()))
            .columns([
                Alias::new(VERSION_COLUMN.to_owned()),
                Alias::new(STATUS_COLUMN.to_owned()),
                Alias::new(COMPLETED_AT_COLUMN.to_owned()),
            ])
            .values_panic([
                Value::String(Some(version.to_string())).into(),
                Value::String(Some(HistoryStatus::Succeeded.as_str().to_owned())).into(),
                Value::BigInt(Some(Utc::now().timestamp_millis())).into(),
            ]);

        let sql = render!(ctx.dialect(), statement);
        ctx.execute_sql(&sql).await
    }
}
