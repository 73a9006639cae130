use async_trait::async_trait;
use stepwise::{ColumnDescriptor, Context, Result, Step};

use crate::m0001::USERS_TABLE;

pub const COLUMN_LAST_CONNECTION_DATE: &str = "last_connection_date";

/// Adds the nullable `users.last_connection_date` column (epoch milliseconds).
pub struct AddLastConnectionDateToUsers;

#[async_trait]
impl Step for AddLastConnectionDateToUsers {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.add_columns_if_missing(
            USERS_TABLE,
            &[ColumnDescriptor::big_integer(COLUMN_LAST_CONNECTION_DATE)],
        )
        .await?;

        Ok(())
    }
}
