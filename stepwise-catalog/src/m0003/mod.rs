//! Creates the `xsrf_tokens` table.

use async_trait::async_trait;
use stepwise::{ColumnDescriptor, Context, Result, Step, TableDescriptor};

pub const XSRF_TOKENS_TABLE: &str = "xsrf_tokens";
pub const COLUMN_ID: &str = "id";
pub const COLUMN_USER_UUID: &str = "user_uuid";
pub const COLUMN_CREATED_AT: &str = "created_at";
pub const COLUMN_UPDATED_AT: &str = "updated_at";

/// Creates the `xsrf_tokens` table, primary key `pk_xsrf_tokens` on `id`.
/// Every column is mandatory.
pub struct CreateXsrfTokensTable;

#[async_trait]
impl Step for CreateXsrfTokensTable {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_table_if_missing(
            &TableDescriptor::new(XSRF_TOKENS_TABLE)
                .primary_key_column(ColumnDescriptor::varchar(COLUMN_ID, 40))
                .column(ColumnDescriptor::varchar(COLUMN_USER_UUID, 40).not_null())
                .column(ColumnDescriptor::big_integer(COLUMN_CREATED_AT).not_null())
                .column(ColumnDescriptor::big_integer(COLUMN_UPDATED_AT).not_null()),
        )
        .await?;

        Ok(())
    }
}
