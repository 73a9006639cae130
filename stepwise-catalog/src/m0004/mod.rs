use async_trait::async_trait;
use stepwise::{Context, IndexDescriptor, Result, Step};

use crate::m0003::{COLUMN_USER_UUID, XSRF_TOKENS_TABLE};

pub const XSRF_TOKENS_USER_UUID_INDEX: &str = "xsrf_tokens_user_uuid";

pub struct CreateIndexOnXsrfTokensUserUuid;

#[async_trait]
impl Step for CreateIndexOnXsrfTokensUserUuid {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
        ctx.create_index_if_missing(
            &IndexDescriptor::new(XSRF_TOKENS_TABLE, XSRF_TOKENS_USER_UUID_INDEX)
                .column(COLUMN_USER_UUID),
        )
        .await?;

        Ok(())
    }
}
