use async_trait::async_trait;
use serde::Serialize;

use crate::{
    ddl::Ddl,
    descriptor::{ColumnDescriptor, ConstraintDescriptor, ConstraintKind, IndexDescriptor, TableDescriptor},
    dialect::Dialect,
    error::{MigrateError, Result},
    introspect::{Introspector, ObjectRef},
    session::Session,
};

/// One versioned unit of schema change.
///
/// `apply` must be idempotent: running it against a schema where the change
/// is already fully or partially present completes the change without error
/// and without duplicating objects. The guarded helpers on [`Context`] make
/// each sub-operation independently idempotent, so a step built from them is
/// too.
#[async_trait]
pub trait Step: Send + Sync {
    async fn apply(&self, ctx: &mut Context<'_>) -> Result<()>;
}

/// Lifecycle of a step within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// What a step executes against: one scoped session and its dialect.
pub struct Context<'a> {
    session: &'a mut dyn Session,
    dialect: Dialect,
}

impl<'a> Context<'a> {
    pub fn new(session: &'a mut dyn Session, dialect: Dialect) -> Self {
        Self { session, dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Raw access to the session, for data migrations and custom checks.
    pub fn session(&mut self) -> &mut dyn Session {
        &mut *self.session
    }

    pub fn introspector(&mut self) -> Introspector<'_> {
        Introspector::new(&mut *self.session, self.dialect)
    }

    pub async fn exists(&mut self, object: &ObjectRef) -> Result<bool> {
        self.introspector().exists(object).await
    }

    /// Builds and executes every statement of `ddl`, in order.
    pub async fn execute(&mut self, ddl: &Ddl) -> Result<()> {
        for sql in ddl.build(self.dialect)? {
            self.session.execute(&sql).await?;
        }

        Ok(())
    }

    pub async fn execute_sql(&mut self, sql: &str) -> Result<()> {
        self.session.execute(sql).await
    }

    /// Creates the table unless it exists. An existing table must already
    /// have every described column.
    pub async fn create_table_if_missing(&mut self, table: &TableDescriptor) -> Result<bool> {
        table.validate(self.dialect)?;

        if !self.introspector().table_exists(&table.name).await? {
            self.execute(&Ddl::CreateTable(table.clone())).await?;
            return Ok(true);
        }

        let existing = self.introspector().columns(&table.name).await?;
        let missing = table
            .columns
            .iter()
            .filter(|c| !existing.contains(&c.name.to_lowercase()))
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>();

        if !missing.is_empty() {
            return Err(MigrateError::conflict(
                ObjectRef::table(&table.name).to_string(),
                format!("exists without column(s) {}", missing.join(", ")),
            ));
        }

        tracing::debug!(table = %table.name, "table already exists, skipping");

        Ok(false)
    }

    pub async fn drop_table_if_exists(&mut self, table: &str) -> Result<bool> {
        if !self.introspector().table_exists(table).await? {
            tracing::debug!(table, "table does not exist, skipping");
            return Ok(false);
        }

        self.execute(&Ddl::DropTable {
            table: table.to_owned(),
        })
        .await?;

        Ok(true)
    }

    /// Creates the index unless one with the same (truncated) name exists on
    /// the table. Where index names are schema-wide, the name being taken by
    /// another table is a [`MigrateError::SchemaConflict`].
    pub async fn create_index_if_missing(&mut self, index: &IndexDescriptor) -> Result<bool> {
        index.validate(self.dialect)?;
        self.require_table(&index.table).await?;

        let name = index.effective_name(self.dialect);
        if self.introspector().index_exists(&index.table, &name).await? {
            tracing::debug!(table = %index.table, index = %name, "index already exists, skipping");
            return Ok(false);
        }

        if self.dialect.index_names_are_schema_wide() {
            let owners = self.introspector().index_tables(&name).await?;
            if let Some(owner) = owners.first() {
                return Err(MigrateError::conflict(
                    ObjectRef::index(&index.table, &name).to_string(),
                    format!("index name already used on table {owner}"),
                ));
            }
        }

        self.execute(&Ddl::CreateIndex(index.clone())).await?;

        Ok(true)
    }

    pub async fn drop_index_if_exists(&mut self, table: &str, name: &str) -> Result<bool> {
        let name = self.dialect.truncate(name);
        if !self.introspector().index_exists(table, &name).await? {
            tracing::debug!(table, index = %name, "index does not exist, skipping");
            return Ok(false);
        }

        self.execute(&Ddl::DropIndex {
            table: table.to_owned(),
            name,
        })
        .await?;

        Ok(true)
    }

    /// Adds the columns the table does not have yet.
    pub async fn add_columns_if_missing(
        &mut self,
        table: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<bool> {
        // Validate the full set, not only the missing subset.
        Ddl::AddColumns {
            table: table.to_owned(),
            columns: columns.to_vec(),
        }
        .build(self.dialect)?;

        self.require_table(table).await?;

        let existing = self.introspector().columns(table).await?;
        let missing = columns
            .iter()
            .filter(|c| !existing.contains(&c.name.to_lowercase()))
            .cloned()
            .collect::<Vec<_>>();

        if missing.is_empty() {
            tracing::debug!(table, "columns already exist, skipping");
            return Ok(false);
        }

        self.execute(&Ddl::AddColumns {
            table: table.to_owned(),
            columns: missing,
        })
        .await?;

        Ok(true)
    }

    /// Drops whichever of the columns still exist.
    pub async fn drop_columns_if_exist(&mut self, table: &str, columns: &[&str]) -> Result<bool> {
        let existing = self.introspector().columns(table).await?;
        let present = columns
            .iter()
            .filter(|c| existing.contains(&c.to_lowercase()))
            .map(|c| c.to_string())
            .collect::<Vec<_>>();

        if present.is_empty() {
            tracing::debug!(table, "columns do not exist, skipping");
            return Ok(false);
        }

        self.execute(&Ddl::DropColumns {
            table: table.to_owned(),
            columns: present,
        })
        .await?;

        Ok(true)
    }

    /// Changes the type of an existing column. Reapplying the same type is
    /// harmless on every engine that supports the operation.
    pub async fn alter_column_type(&mut self, table: &str, column: &ColumnDescriptor) -> Result<bool> {
        let ddl = Ddl::AlterColumnType {
            table: table.to_owned(),
            column: column.clone(),
        };
        ddl.build(self.dialect)?;

        let object = ObjectRef::column(table, &column.name);
        if !self.exists(&object).await? {
            return Err(MigrateError::conflict(object.to_string(), "does not exist"));
        }

        self.execute(&ddl).await?;

        Ok(true)
    }

    /// Adds the constraint unless present. Primary keys are matched by kind,
    /// unique constraints by (truncated) name.
    pub async fn add_constraint_if_missing(
        &mut self,
        constraint: &ConstraintDescriptor,
    ) -> Result<bool> {
        constraint.validate(self.dialect)?;
        self.require_constraint_ddl("add constraint")?;
        self.require_table(&constraint.table).await?;

        if self
            .constraint_present(
                &constraint.table,
                &constraint.effective_name(self.dialect),
                constraint.kind,
            )
            .await?
        {
            tracing::debug!(
                table = %constraint.table,
                constraint = %constraint.name,
                "constraint already exists, skipping"
            );
            return Ok(false);
        }

        self.execute(&Ddl::AddConstraint(constraint.clone())).await?;

        Ok(true)
    }

    pub async fn drop_constraint_if_exists(
        &mut self,
        table: &str,
        name: &str,
        kind: ConstraintKind,
    ) -> Result<bool> {
        self.require_constraint_ddl("drop constraint")?;

        let name = self.dialect.truncate(name);
        if !self.constraint_present(table, &name, kind).await? {
            tracing::debug!(table, constraint = %name, "constraint does not exist, skipping");
            return Ok(false);
        }

        self.execute(&Ddl::DropConstraint {
            table: table.to_owned(),
            name,
            kind,
        })
        .await?;

        Ok(true)
    }

    async fn constraint_present(
        &mut self,
        table: &str,
        name: &str,
        kind: ConstraintKind,
    ) -> Result<bool> {
        let mut introspector = self.introspector();

        match kind {
            ConstraintKind::PrimaryKey => introspector.has_primary_key(table).await,
            ConstraintKind::Unique => introspector.constraint_exists(table, name).await,
        }
    }

    async fn require_table(&mut self, table: &str) -> Result<()> {
        if self.introspector().table_exists(table).await? {
            return Ok(());
        }

        Err(MigrateError::conflict(
            ObjectRef::table(table).to_string(),
            "does not exist",
        ))
    }

    fn require_constraint_ddl(&self, operation: &'static str) -> Result<()> {
        if self.dialect.supports_constraint_ddl() {
            return Ok(());
        }

        Err(MigrateError::Unsupported {
            dialect: self.dialect,
            operation,
        })
    }
}
