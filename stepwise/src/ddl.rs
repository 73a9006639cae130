//! DDL builders.
//!
//! Every kind of schema change is one variant of [`Ddl`]. Building is pure:
//! the same `(Ddl, Dialect)` pair always yields the same statements, which is
//! what lets these be tested without a database.

use sea_query::{Alias, ColumnDef, Index, Table};

use crate::{
    descriptor::{
        validate_column_names, validate_columns, validate_identifier, ColumnDefault,
        ColumnDescriptor, ConstraintDescriptor, ConstraintKind, IndexDescriptor, TableDescriptor,
    },
    dialect::{render, Dialect},
    error::{MigrateError, Result},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ddl {
    CreateTable(TableDescriptor),
    DropTable {
        table: String,
    },
    CreateIndex(IndexDescriptor),
    DropIndex {
        table: String,
        name: String,
    },
    AddColumns {
        table: String,
        columns: Vec<ColumnDescriptor>,
    },
    DropColumns {
        table: String,
        columns: Vec<String>,
    },
    AlterColumnType {
        table: String,
        column: ColumnDescriptor,
    },
    AddConstraint(ConstraintDescriptor),
    DropConstraint {
        table: String,
        name: String,
        kind: ConstraintKind,
    },
}

impl Ddl {
    /// Validates the descriptor and renders it as an ordered list of statements.
    pub fn build(&self, dialect: Dialect) -> Result<Vec<String>> {
        match self {
            Self::CreateTable(table) => create_table(table, dialect),
            Self::DropTable { table } => {
                validate_identifier("table", table, dialect)?;
                let statement = Table::drop().table(iden(table)).to_owned();

                Ok(vec![render!(dialect, statement)])
            }
            Self::CreateIndex(index) => create_index(index, dialect),
            Self::DropIndex { table, name } => {
                validate_identifier("table", table, dialect)?;
                if name.is_empty() {
                    return Err(MigrateError::malformed("index name must not be empty"));
                }

                let statement = Index::drop()
                    .name(dialect.truncate(name))
                    .table(iden(table))
                    .to_owned();

                Ok(vec![render!(dialect, statement)])
            }
            Self::AddColumns { table, columns } => add_columns(table, columns, dialect),
            Self::DropColumns { table, columns } => drop_columns(table, columns, dialect),
            Self::AlterColumnType { table, column } => alter_column_type(table, column, dialect),
            Self::AddConstraint(constraint) => add_constraint(constraint, dialect),
            Self::DropConstraint { table, name, kind } => {
                drop_constraint(table, name, *kind, dialect)
            }
        }
    }

    /// Short operation name used in logs and errors.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::CreateTable(_) => "create table",
            Self::DropTable { .. } => "drop table",
            Self::CreateIndex(_) => "create index",
            Self::DropIndex { .. } => "drop index",
            Self::AddColumns { .. } => "add columns",
            Self::DropColumns { .. } => "drop columns",
            Self::AlterColumnType { .. } => "alter column type",
            Self::AddConstraint(_) => "add constraint",
            Self::DropConstraint { .. } => "drop constraint",
        }
    }
}

fn iden(name: &str) -> Alias {
    Alias::new(name.to_owned())
}

fn column_def(column: &ColumnDescriptor, dialect: Dialect) -> ColumnDef {
    let mut def = ColumnDef::new(iden(&column.name));
    def.custom(iden(&dialect.native_type(&column.column_type)));

    if !column.nullable {
        def.not_null();
    }

    match &column.default {
        Some(ColumnDefault::Bool(value)) => {
            def.default(*value);
        }
        Some(ColumnDefault::Integer(value)) => {
            def.default(*value);
        }
        Some(ColumnDefault::Text(value)) => {
            def.default(value.clone());
        }
        None => {}
    }

    def
}

fn create_table(table: &TableDescriptor, dialect: Dialect) -> Result<Vec<String>> {
    table.validate(dialect)?;

    let mut statement = Table::create();
    statement.table(iden(&table.name));

    for column in &table.columns {
        statement.col(&mut column_def(column, dialect));
    }

    if !table.primary_key.is_empty() {
        let mut pk = Index::create();
        pk.name(table.effective_primary_key_name(dialect));
        for column in &table.primary_key {
            pk.col(iden(column));
        }
        statement.primary_key(&mut pk);
    }

    Ok(vec![render!(dialect, statement)])
}

fn create_index(index: &IndexDescriptor, dialect: Dialect) -> Result<Vec<String>> {
    index.validate(dialect)?;

    let mut statement = Index::create();
    statement
        .name(index.effective_name(dialect))
        .table(iden(&index.table));

    for column in &index.columns {
        statement.col(iden(column));
    }

    if index.unique {
        statement.unique();
    }

    Ok(vec![render!(dialect, statement)])
}

fn add_columns(table: &str, columns: &[ColumnDescriptor], dialect: Dialect) -> Result<Vec<String>> {
    validate_identifier("table", table, dialect)?;
    validate_columns(table, columns, dialect)?;

    if let Some(column) = columns
        .iter()
        .find(|c| !c.nullable && c.default.is_none())
    {
        return Err(MigrateError::malformed(format!(
            "table '{table}': added column '{}' must be nullable or have a default",
            column.name
        )));
    }

    if dialect.supports_multiple_alter_clauses() {
        let mut statement = Table::alter();
        statement.table(iden(table));
        for column in columns {
            statement.add_column(&mut column_def(column, dialect));
        }

        return Ok(vec![render!(dialect, statement)]);
    }

    Ok(columns
        .iter()
        .map(|column| {
            let statement = Table::alter()
                .table(iden(table))
                .add_column(&mut column_def(column, dialect))
                .to_owned();
            render!(dialect, statement)
        })
        .collect())
}

fn drop_columns(table: &str, columns: &[String], dialect: Dialect) -> Result<Vec<String>> {
    validate_identifier("table", table, dialect)?;
    validate_column_names(&format!("table '{table}'"), columns, dialect)?;

    if dialect.supports_multiple_alter_clauses() {
        let mut statement = Table::alter();
        statement.table(iden(table));
        for column in columns {
            statement.drop_column(iden(column));
        }

        return Ok(vec![render!(dialect, statement)]);
    }

    Ok(columns
        .iter()
        .map(|column| {
            let statement = Table::alter()
                .table(iden(table))
                .drop_column(iden(column))
                .to_owned();
            render!(dialect, statement)
        })
        .collect())
}

fn alter_column_type(table: &str, column: &ColumnDescriptor, dialect: Dialect) -> Result<Vec<String>> {
    validate_identifier("table", table, dialect)?;
    column.validate(dialect)?;

    if !dialect.supports_alter_column_type() {
        return Err(MigrateError::Unsupported {
            dialect,
            operation: "alter column type",
        });
    }

    // MySQL's MODIFY restates nullability; PostgreSQL needs it spelled out.
    let mut def = column_def(column, dialect);
    if column.nullable {
        def.null();
    }

    let statement = Table::alter()
        .table(iden(table))
        .modify_column(&mut def)
        .to_owned();

    Ok(vec![render!(dialect, statement)])
}

fn add_constraint(constraint: &ConstraintDescriptor, dialect: Dialect) -> Result<Vec<String>> {
    constraint.validate(dialect)?;

    if !dialect.supports_constraint_ddl() {
        return Err(MigrateError::Unsupported {
            dialect,
            operation: "add constraint",
        });
    }

    let columns = constraint
        .columns
        .iter()
        .map(|c| dialect.quote(c))
        .collect::<Vec<_>>()
        .join(", ");

    let kind = match constraint.kind {
        ConstraintKind::PrimaryKey => "PRIMARY KEY",
        ConstraintKind::Unique => "UNIQUE",
    };

    Ok(vec![format!(
        "ALTER TABLE {} ADD CONSTRAINT {} {kind} ({columns})",
        dialect.quote(&constraint.table),
        dialect.quote(&constraint.effective_name(dialect)),
    )])
}

fn drop_constraint(
    table: &str,
    name: &str,
    kind: ConstraintKind,
    dialect: Dialect,
) -> Result<Vec<String>> {
    validate_identifier("table", table, dialect)?;
    if name.is_empty() {
        return Err(MigrateError::malformed("constraint name must not be empty"));
    }

    if !dialect.supports_constraint_ddl() {
        return Err(MigrateError::Unsupported {
            dialect,
            operation: "drop constraint",
        });
    }

    let table = dialect.quote(table);
    let name = dialect.quote(&dialect.truncate(name));

    let sql = match (dialect, kind) {
        (Dialect::MySql, ConstraintKind::PrimaryKey) => {
            format!("ALTER TABLE {table} DROP PRIMARY KEY")
        }
        (Dialect::MySql, ConstraintKind::Unique) => format!("ALTER TABLE {table} DROP INDEX {name}"),
        _ => format!("ALTER TABLE {table} DROP CONSTRAINT {name}"),
    };

    Ok(vec![sql])
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIALECTS: [Dialect; 3] = [Dialect::Sqlite, Dialect::MySql, Dialect::Postgres];

    fn xsrf_tokens() -> TableDescriptor {
        TableDescriptor::new("xsrf_tokens")
            .primary_key_column(ColumnDescriptor::varchar("id", 40))
            .column(ColumnDescriptor::varchar("user_uuid", 40).not_null())
            .column(ColumnDescriptor::big_integer("created_at").not_null())
            .column(ColumnDescriptor::big_integer("updated_at").not_null())
    }

    #[test]
    fn build_is_deterministic() {
        let ddls = [
            Ddl::CreateTable(xsrf_tokens()),
            Ddl::CreateIndex(
                IndexDescriptor::new("users", "users_email")
                    .column("email")
                    .unique(true),
            ),
            Ddl::AddColumns {
                table: "users".into(),
                columns: vec![
                    ColumnDescriptor::big_integer("last_connection_date"),
                    ColumnDescriptor::boolean("reset_password")
                        .not_null()
                        .default_value(ColumnDefault::Bool(false)),
                ],
            },
        ];

        for dialect in DIALECTS {
            for ddl in &ddls {
                assert_eq!(ddl.build(dialect).unwrap(), ddl.build(dialect).unwrap());
            }
        }
    }

    #[test]
    fn create_table_uses_dialect_quoting_and_types() {
        let pg = Ddl::CreateTable(xsrf_tokens()).build(Dialect::Postgres).unwrap();
        assert_eq!(pg.len(), 1);
        assert!(pg[0].starts_with("CREATE TABLE \"xsrf_tokens\""));
        assert!(pg[0].contains("\"user_uuid\" VARCHAR(40) NOT NULL"));
        assert!(pg[0].contains("BIGINT"));
        assert!(pg[0].contains("\"pk_xsrf_tokens\""));
        assert!(pg[0].contains("PRIMARY KEY"));

        let mysql = Ddl::CreateTable(xsrf_tokens()).build(Dialect::MySql).unwrap();
        assert!(mysql[0].starts_with("CREATE TABLE `xsrf_tokens`"));
        assert!(mysql[0].contains("`id` VARCHAR(40) NOT NULL"));
    }

    #[test]
    fn create_table_rejects_zero_columns() {
        let err = Ddl::CreateTable(TableDescriptor::new("empty"))
            .build(Dialect::Sqlite)
            .unwrap_err();

        assert!(matches!(err, MigrateError::MalformedDescriptor(_)));
        assert!(err.to_string().contains("at least one column"));
    }

    #[test]
    fn create_table_rejects_duplicate_columns() {
        let table = xsrf_tokens().column(ColumnDescriptor::varchar("user_uuid", 40));

        for dialect in DIALECTS {
            assert!(matches!(
                Ddl::CreateTable(table.clone()).build(dialect),
                Err(MigrateError::MalformedDescriptor(_))
            ));
        }
    }

    #[test]
    fn create_index_unique_and_plain() {
        let unique = Ddl::CreateIndex(
            IndexDescriptor::new("users", "users_email")
                .column("email")
                .unique(true),
        )
        .build(Dialect::Sqlite)
        .unwrap();
        assert!(unique[0].starts_with("CREATE UNIQUE INDEX \"users_email\""));
        assert!(unique[0].contains("\"users\""));

        let plain = Ddl::CreateIndex(IndexDescriptor::new("users", "users_email").column("email"))
            .build(Dialect::MySql)
            .unwrap();
        assert!(plain[0].starts_with("CREATE INDEX `users_email`"));
    }

    #[test]
    fn create_index_truncates_long_names() {
        let name = format!("idx_{}", "n".repeat(70));
        let sql = Ddl::CreateIndex(IndexDescriptor::new("users", &name).column("email"))
            .build(Dialect::Postgres)
            .unwrap();

        let truncated = Dialect::Postgres.truncate(&name);
        assert_eq!(truncated.len(), 63);
        assert!(sql[0].contains(&format!("\"{truncated}\"")));
        assert!(!sql[0].contains(&name));
    }

    #[test]
    fn add_columns_splits_on_sqlite_only() {
        let ddl = Ddl::AddColumns {
            table: "users".into(),
            columns: vec![
                ColumnDescriptor::big_integer("last_connection_date"),
                ColumnDescriptor::varchar("external_id", 255),
            ],
        };

        let sqlite = ddl.build(Dialect::Sqlite).unwrap();
        assert_eq!(sqlite.len(), 2);
        assert!(sqlite[0].contains("\"last_connection_date\" BIGINT"));
        assert!(sqlite[1].contains("\"external_id\" VARCHAR(255)"));

        let pg = ddl.build(Dialect::Postgres).unwrap();
        assert_eq!(pg.len(), 1);
        assert!(pg[0].contains("\"last_connection_date\""));
        assert!(pg[0].contains("\"external_id\""));
    }

    #[test]
    fn add_columns_requires_nullable_or_default() {
        let err = Ddl::AddColumns {
            table: "users".into(),
            columns: vec![ColumnDescriptor::big_integer("counter").not_null()],
        }
        .build(Dialect::Postgres)
        .unwrap_err();

        assert!(err.to_string().contains("must be nullable or have a default"));
    }

    #[test]
    fn drop_columns_splits_on_sqlite_only() {
        let ddl = Ddl::DropColumns {
            table: "users".into(),
            columns: vec!["a".into(), "b".into()],
        };

        assert_eq!(ddl.build(Dialect::Sqlite).unwrap().len(), 2);
        assert_eq!(ddl.build(Dialect::MySql).unwrap().len(), 1);
    }

    #[test]
    fn alter_column_type_is_unsupported_on_sqlite() {
        let ddl = Ddl::AlterColumnType {
            table: "event".into(),
            column: ColumnDescriptor::varchar("name", 50).not_null(),
        };

        assert!(matches!(
            ddl.build(Dialect::Sqlite),
            Err(MigrateError::Unsupported {
                dialect: Dialect::Sqlite,
                ..
            })
        ));

        let pg = ddl.build(Dialect::Postgres).unwrap();
        assert!(pg[0].starts_with("ALTER TABLE \"event\""));
        assert!(pg[0].contains("VARCHAR(50)"));

        let mysql = ddl.build(Dialect::MySql).unwrap();
        assert!(mysql[0].contains("MODIFY COLUMN `name` VARCHAR(50) NOT NULL"));
    }

    #[test]
    fn alter_column_type_to_nullable_drops_not_null() {
        let ddl = Ddl::AlterColumnType {
            table: "users".into(),
            column: ColumnDescriptor::varchar("login", 300),
        };

        let pg = ddl.build(Dialect::Postgres).unwrap();
        assert_eq!(pg.len(), 1);
        assert!(pg[0].contains("ALTER COLUMN \"login\" TYPE VARCHAR(300)"));
        assert!(pg[0].contains("ALTER COLUMN \"login\" DROP NOT NULL"));

        let mysql = ddl.build(Dialect::MySql).unwrap();
        assert!(mysql[0].contains("MODIFY COLUMN `login` VARCHAR(300)"));
        assert!(!mysql[0].contains("NOT NULL"));
    }

    #[test]
    fn constraints() {
        let unique = Ddl::AddConstraint(
            ConstraintDescriptor::unique("users", "uniq_users_login").column("login"),
        );
        assert_eq!(
            unique.build(Dialect::Postgres).unwrap(),
            vec!["ALTER TABLE \"users\" ADD CONSTRAINT \"uniq_users_login\" UNIQUE (\"login\")"]
        );
        assert!(matches!(
            unique.build(Dialect::Sqlite),
            Err(MigrateError::Unsupported { .. })
        ));

        let drop_pk = Ddl::DropConstraint {
            table: "users".into(),
            name: "pk_users".into(),
            kind: ConstraintKind::PrimaryKey,
        };
        assert_eq!(
            drop_pk.build(Dialect::MySql).unwrap(),
            vec!["ALTER TABLE `users` DROP PRIMARY KEY"]
        );
        assert_eq!(
            drop_pk.build(Dialect::Postgres).unwrap(),
            vec!["ALTER TABLE \"users\" DROP CONSTRAINT \"pk_users\""]
        );

        let drop_unique = Ddl::DropConstraint {
            table: "users".into(),
            name: "uniq_users_login".into(),
            kind: ConstraintKind::Unique,
        };
        assert_eq!(
            drop_unique.build(Dialect::MySql).unwrap(),
            vec!["ALTER TABLE `users` DROP INDEX `uniq_users_login`"]
        );
    }

    #[test]
    fn drop_table_and_index() {
        let table = Ddl::DropTable {
            table: "snapshot".into(),
        };
        assert!(table.build(Dialect::Sqlite).unwrap()[0].starts_with("DROP TABLE \"snapshot\""));

        let index = Ddl::DropIndex {
            table: "users".into(),
            name: "users_email".into(),
        };
        let mysql = index.build(Dialect::MySql).unwrap();
        assert!(mysql[0].starts_with("DROP INDEX `users_email`"));
        assert!(mysql[0].contains("`users`"));
    }
}
