//! The application's schema history, as an ordered list of migration steps.
//!
//! Versions are declared once, in ascending order, and never renumbered. New
//! steps are appended with a higher version.
//!
//! ```rust,ignore
//! let registry = stepwise_catalog::registry()?;
//! stepwise::run_pending_migrations(&pool, registry).await?;
//! ```
//!
//! # Steps
//!
//! - `1` [`CreateUsersTable`] - Creates the `users` table
//! - `2` [`CreateIndexForEmailOnUsersTable`] - Indexes `users.email`
//! - `3` [`CreateXsrfTokensTable`] - Creates the `xsrf_tokens` table
//! - `4` [`CreateIndexOnXsrfTokensUserUuid`] - Indexes `xsrf_tokens.user_uuid`
//! - `5` [`AddLastConnectionDateToUsers`] - Adds `users.last_connection_date`

use stepwise::{Registry, Result};

mod m0001;
mod m0002;
mod m0003;
mod m0004;
mod m0005;

pub use m0001::{CreateUsersTable, USERS_TABLE};
pub use m0002::{CreateIndexForEmailOnUsersTable, USERS_EMAIL_INDEX};
pub use m0003::{
    CreateXsrfTokensTable, COLUMN_CREATED_AT, COLUMN_ID, COLUMN_UPDATED_AT, COLUMN_USER_UUID,
    XSRF_TOKENS_TABLE,
};
pub use m0004::{CreateIndexOnXsrfTokensUserUuid, XSRF_TOKENS_USER_UUID_INDEX};
pub use m0005::{AddLastConnectionDateToUsers, COLUMN_LAST_CONNECTION_DATE};

/// Builds the registry with every catalog step.
pub fn registry() -> Result<Registry> {
    Registry::builder()
        .add(1, "Create table users", CreateUsersTable)
        .add(2, "Create index users_email on users", CreateIndexForEmailOnUsersTable)
        .add(3, "Create table xsrf_tokens", CreateXsrfTokensTable)
        .add(4, "Create index xsrf_tokens_user_uuid on xsrf_tokens", CreateIndexOnXsrfTokensUserUuid)
        .add(5, "Add column last_connection_date to users", AddLastConnectionDateToUsers)
        .build()
}
