//! Target database engines and their SQL quirks.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::{
    descriptor::ColumnType,
    error::{MigrateError, Result},
};

/// The SQL dialect a migration renders DDL for.
///
/// A dialect answers the questions DDL builders cannot answer on their own:
/// how identifiers are quoted, how long they may be, which native type a
/// logical [`ColumnType`] maps to, and which `ALTER TABLE` forms exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Sqlite,
    MySql,
    Postgres,
}

impl Dialect {
    /// Resolves the dialect from an sqlx driver name (`Database::NAME`).
    pub fn from_database_name(name: &str) -> Result<Self> {
        match name {
            "SQLite" => Ok(Self::Sqlite),
            "MySQL" => Ok(Self::MySql),
            "PostgreSQL" => Ok(Self::Postgres),
            name => Err(MigrateError::UnsupportedDatabase(name.to_owned())),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::MySql => "mysql",
            Self::Postgres => "postgresql",
        }
    }

    pub fn max_identifier_length(&self) -> usize {
        match self {
            Self::Sqlite => 128,
            Self::MySql => 64,
            Self::Postgres => 63,
        }
    }

    /// Quotes an identifier, doubling any embedded quote character.
    pub fn quote(&self, identifier: &str) -> String {
        match self {
            Self::MySql => format!("`{}`", identifier.replace('`', "``")),
            Self::Sqlite | Self::Postgres => format!("\"{}\"", identifier.replace('"', "\"\"")),
        }
    }

    /// Cuts a derived name (index, constraint) down to the identifier limit.
    pub fn truncate(&self, name: &str) -> String {
        name.chars().take(self.max_identifier_length()).collect()
    }

    /// Renders a string literal, escaped for this dialect.
    pub fn literal(&self, value: &str) -> String {
        let escaped = value.replace('\'', "''");
        match self {
            Self::MySql => format!("'{}'", escaped.replace('\\', "\\\\")),
            Self::Sqlite | Self::Postgres => format!("'{escaped}'"),
        }
    }

    /// Maps a logical column type to the engine's native type name.
    pub fn native_type(&self, column_type: &ColumnType) -> String {
        match (self, column_type) {
            (Self::MySql, ColumnType::Boolean) => "TINYINT(1)".to_owned(),
            (_, ColumnType::Boolean) => "BOOLEAN".to_owned(),
            (Self::MySql, ColumnType::Integer) => "INT".to_owned(),
            (_, ColumnType::Integer) => "INTEGER".to_owned(),
            (_, ColumnType::BigInteger) => "BIGINT".to_owned(),
            (_, ColumnType::Varchar(size)) => format!("VARCHAR({size})"),
            (Self::MySql, ColumnType::Clob) => "LONGTEXT".to_owned(),
            (_, ColumnType::Clob) => "TEXT".to_owned(),
            (Self::Sqlite, ColumnType::Blob) => "BLOB".to_owned(),
            (Self::MySql, ColumnType::Blob) => "LONGBLOB".to_owned(),
            (Self::Postgres, ColumnType::Blob) => "BYTEA".to_owned(),
            (Self::MySql, ColumnType::Timestamp) => "DATETIME".to_owned(),
            (_, ColumnType::Timestamp) => "TIMESTAMP".to_owned(),
            (Self::Postgres, ColumnType::Decimal { precision, scale }) => {
                format!("NUMERIC({precision},{scale})")
            }
            (_, ColumnType::Decimal { precision, scale }) => {
                format!("DECIMAL({precision},{scale})")
            }
        }
    }

    pub fn supports_alter_column_type(&self) -> bool {
        !matches!(self, Self::Sqlite)
    }

    pub fn supports_constraint_ddl(&self) -> bool {
        !matches!(self, Self::Sqlite)
    }

    /// Whether index names must be unique across the schema rather than per
    /// table.
    pub fn index_names_are_schema_wide(&self) -> bool {
        !matches!(self, Self::MySql)
    }

    /// Whether one `ALTER TABLE` may carry several add/drop column clauses.
    pub fn supports_multiple_alter_clauses(&self) -> bool {
        !matches!(self, Self::Sqlite)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Dialect {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "mysql" => Ok(Self::MySql),
            "postgresql" | "postgres" => Ok(Self::Postgres),
            other => Err(MigrateError::UnsupportedDatabase(other.to_owned())),
        }
    }
}

/// Renders a sea-query statement with the builder matching the dialect.
macro_rules! render {
    ($dialect:expr, $statement:expr) => {
        match $dialect {
            $crate::dialect::Dialect::Sqlite => $statement.to_string(sea_query::SqliteQueryBuilder),
            $crate::dialect::Dialect::MySql => $statement.to_string(sea_query::MysqlQueryBuilder),
            $crate::dialect::Dialect::Postgres => {
                $statement.to_string(sea_query::PostgresQueryBuilder)
            }
        }
    };
}

pub(crate) use render;
