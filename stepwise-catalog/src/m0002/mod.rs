use async_trait::async_trait;
use stepwise::{Context, IndexDescriptor, Result, Step};

use crate::m0001::USERS_TABLE;

pub const USERS_EMAIL_INDEX: &str = "users_email";

/// Indexes `users.email` (non-unique) for lookups by email address.
pub struct CreateIndexForEmailOnUsersTable;

#[async_trait]
impl Step for CreateIndexForEmailOnUsersTable {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_index_if_missing(
            &IndexDescriptor::new(USERS_TABLE, USERS_EMAIL_INDEX)
                .column("email")
                .unique(false),
        )
        .await?;

        Ok(())
    }
}
