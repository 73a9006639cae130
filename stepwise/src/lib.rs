//! Ordered, idempotent schema migrations for SQLite, MySQL and PostgreSQL.
//!
//! An application declares its schema history as a [`Registry`] of versioned
//! [`Step`]s. At startup, [`run_pending_migrations`] applies every step the
//! database has not completed yet, in ascending version order, and records
//! each one in a history table before moving to the next. A failed step stops
//! the run; the next run resumes from it.
//!
//! # Features
//!
//! - **`sqlite`** - Enables SQLite database support
//! - **`mysql`** - Enables MySQL database support
//! - **`postgres`** - Enables PostgreSQL database support
//!
//! All features are enabled by default.
//!
//! # Writing steps
//!
//! Steps describe schema objects with descriptors and apply them through the
//! guarded helpers of [`Context`], which check the live catalog first. Each
//! helper is idempotent, so a step composed of them can be re-run after a
//! partial failure.
//!
//! ```rust,ignore
//! use stepwise::{ColumnDescriptor, Context, IndexDescriptor, Result, Step, TableDescriptor};
//!
//! struct CreateUsersTable;
//!
//! #[async_trait::async_trait]
//! impl Step for CreateUsersTable {
//!     async fn apply(&self, ctx: &mut Context<'_>) -> Result<()> {
//!         ctx.create_table_if_missing(
//!             &TableDescriptor::new("users")
//!                 .primary_key_column(ColumnDescriptor::varchar("uuid", 40))
//!                 .column(ColumnDescriptor::varchar("email", 100)),
//!         )
//!         .await?;
//!
//!         ctx.create_index_if_missing(
//!             &IndexDescriptor::new("users", "users_email").column("email").unique(true),
//!         )
//!         .await?;
//!
//!         Ok(())
//!     }
//! }
//!
//! let registry = stepwise::Registry::builder()
//!     .add(1, "Create table users", CreateUsersTable)
//!     .build()?;
//!
//! stepwise::run_pending_migrations(&pool, registry).await?;
//! ```

mod config;
mod ddl;
mod descriptor;
mod dialect;
mod error;
mod history;
mod introspect;
mod registry;
mod runner;
mod session;
mod step;

pub use config::{ConfigBuilder, HistoryPolicy, MigratorConfig, DEFAULT_HISTORY_TABLE};
pub use ddl::Ddl;
pub use descriptor::{
    validate_identifier, ColumnDefault, ColumnDescriptor, ColumnType, ConstraintDescriptor,
    ConstraintKind, IndexDescriptor, TableDescriptor, MAX_DECIMAL_PRECISION, MAX_VARCHAR_SIZE,
};
pub use dialect::Dialect;
pub use error::{MigrateError, Result};
pub use history::{HistoryStatus, HistoryStore};
pub use introspect::{columns_query, exists_query, primary_key_query, Introspector, ObjectRef};
pub use registry::{RegisteredStep, Registry, RegistryBuilder, Version};
pub use runner::{
    plan, run_pending_migrations, MigrationState, MigrationStatus, Migrator, RunReport, RunStatus,
};
pub use session::Session;
pub use step::{Context, Step, StepState};
