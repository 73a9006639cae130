//! Creates the `users` table.

use async_trait::async_trait;
use stepwise::{ColumnDefault, ColumnDescriptor, Context, Result, Step, TableDescriptor};

pub const USERS_TABLE: &str = "users";

/// Creates the `users` table:
/// - `uuid` - User identifier (VARCHAR(40), primary key `pk_users`)
/// - `login` - Unique login (VARCHAR(255))
/// - `name` - Display name (VARCHAR(200), nullable)
/// - `email` - Email address (VARCHAR(100), nullable)
/// - `active` - Whether the account is enabled (defaults to true)
/// - `created_at` / `updated_at` - Epoch milliseconds (BIGINT)
pub struct CreateUsersTable;

fn table() -> TableDescriptor {
    TableDescriptor::new(USERS_TABLE)
        .primary_key_column(ColumnDescriptor::varchar("uuid", 40))
        .column(ColumnDescriptor::varchar("login", 255).not_null())
        .column(ColumnDescriptor::varchar("name", 200))
        .column(ColumnDescriptor::varchar("email", 100))
        .column(
            ColumnDescriptor::boolean("active")
                .not_null()
                .default_value(ColumnDefault::Bool(true)),
        )
        .column(ColumnDescriptor::big_integer("created_at").not_null())
        .column(ColumnDescriptor::big_integer("updated_at").not_null())
}

#[async_trait]
impl Step for CreateUsersTable {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_table_if_missing(&table()).await?;

        Ok(())
    }
}
