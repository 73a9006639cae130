//! Abstract descriptions of tables, columns, indexes and constraints.
//!
//! Descriptors are built transiently by a step, validated against a
//! [`Dialect`] and handed to the [`Ddl`](crate::Ddl) builders. They are never
//! persisted.

use std::collections::HashSet;

use crate::{
    dialect::Dialect,
    error::{MigrateError, Result},
};

/// Largest `VARCHAR` size accepted on every supported engine.
pub const MAX_VARCHAR_SIZE: u32 = 4000;

/// Largest decimal precision accepted on every supported engine.
pub const MAX_DECIMAL_PRECISION: u32 = 38;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    Boolean,
    Integer,
    BigInteger,
    Varchar(u32),
    Clob,
    Blob,
    Timestamp,
    Decimal { precision: u32, scale: u32 },
}

/// A literal column default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDefault {
    Bool(bool),
    Integer(i64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub column_type: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnDescriptor {
    /// A nullable column without default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            default: None,
        }
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Boolean)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn big_integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::BigInteger)
    }

    pub fn varchar(name: impl Into<String>, size: u32) -> Self {
        Self::new(name, ColumnType::Varchar(size))
    }

    pub fn clob(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Clob)
    }

    pub fn blob(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Blob)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Timestamp)
    }

    pub fn decimal(name: impl Into<String>, precision: u32, scale: u32) -> Self {
        Self::new(name, ColumnType::Decimal { precision, scale })
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn default_value(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn validate(&self, dialect: Dialect) -> Result<()> {
        validate_identifier("column", &self.name, dialect)?;

        match self.column_type {
            ColumnType::Varchar(size) if size == 0 || size > MAX_VARCHAR_SIZE => {
                return Err(MigrateError::malformed(format!(
                    "column '{}': varchar size {size} is outside 1..={MAX_VARCHAR_SIZE}",
                    self.name
                )));
            }
            ColumnType::Decimal { precision, scale }
                if precision == 0 || precision > MAX_DECIMAL_PRECISION || scale > precision =>
            {
                return Err(MigrateError::malformed(format!(
                    "column '{}': decimal({precision},{scale}) needs precision in 1..={MAX_DECIMAL_PRECISION} and scale <= precision",
                    self.name
                )));
            }
            _ => {}
        }

        let Some(default) = &self.default else {
            return Ok(());
        };

        let compatible = matches!(
            (&self.column_type, default),
            (ColumnType::Boolean, ColumnDefault::Bool(_))
                | (ColumnType::Integer, ColumnDefault::Integer(_))
                | (ColumnType::BigInteger, ColumnDefault::Integer(_))
                | (ColumnType::Varchar(_), ColumnDefault::Text(_))
        );

        if !compatible {
            return Err(MigrateError::malformed(format!(
                "column '{}': default {default:?} does not fit {:?}",
                self.name, self.column_type
            )));
        }

        if let (ColumnType::Varchar(size), ColumnDefault::Text(text)) = (&self.column_type, default)
        {
            if text.chars().count() > *size as usize {
                return Err(MigrateError::malformed(format!(
                    "column '{}': default is longer than varchar({size})",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub columns: Vec<ColumnDescriptor>,
    pub primary_key: Vec<String>,
    pub primary_key_name: Option<String>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            primary_key_name: None,
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Adds a non-nullable column and appends it to the primary key.
    pub fn primary_key_column(mut self, column: ColumnDescriptor) -> Self {
        self.primary_key.push(column.name.clone());
        self.columns.push(column.not_null());
        self
    }

    pub fn primary_key_name(mut self, name: impl Into<String>) -> Self {
        self.primary_key_name = Some(name.into());
        self
    }

    /// The primary key constraint name, `pk_<table>` unless overridden,
    /// truncated to the dialect's identifier limit.
    pub fn effective_primary_key_name(&self, dialect: Dialect) -> String {
        let name = self
            .primary_key_name
            .clone()
            .unwrap_or_else(|| format!("pk_{}", self.name));

        dialect.truncate(&name)
    }

    pub fn validate(&self, dialect: Dialect) -> Result<()> {
        validate_identifier("table", &self.name, dialect)?;
        validate_columns(&self.name, &self.columns, dialect)?;

        let mut seen = HashSet::new();
        for key in &self.primary_key {
            if !seen.insert(key.as_str()) {
                return Err(MigrateError::malformed(format!(
                    "table '{}': primary key column '{key}' listed twice",
                    self.name
                )));
            }

            let Some(column) = self.columns.iter().find(|c| &c.name == key) else {
                return Err(MigrateError::malformed(format!(
                    "table '{}': primary key column '{key}' is not declared",
                    self.name
                )));
            };

            if column.nullable {
                return Err(MigrateError::malformed(format!(
                    "table '{}': primary key column '{key}' must not be nullable",
                    self.name
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescriptor {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDescriptor {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            columns: Vec::new(),
            unique: false,
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }

    /// The index name as it will exist in the catalog.
    pub fn effective_name(&self, dialect: Dialect) -> String {
        dialect.truncate(&self.name)
    }

    pub fn validate(&self, dialect: Dialect) -> Result<()> {
        validate_identifier("table", &self.table, dialect)?;
        validate_derived_name("index", &self.name)?;
        validate_column_names(&format!("index '{}'", self.name), &self.columns, dialect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintDescriptor {
    pub table: String,
    pub name: String,
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
}

impl ConstraintDescriptor {
    pub fn primary_key(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(table, name, ConstraintKind::PrimaryKey)
    }

    pub fn unique(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(table, name, ConstraintKind::Unique)
    }

    fn new(table: impl Into<String>, name: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            kind,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    pub fn effective_name(&self, dialect: Dialect) -> String {
        dialect.truncate(&self.name)
    }

    pub fn validate(&self, dialect: Dialect) -> Result<()> {
        validate_identifier("table", &self.table, dialect)?;
        validate_derived_name("constraint", &self.name)?;
        validate_column_names(
            &format!("constraint '{}'", self.name),
            &self.columns,
            dialect,
        )
    }
}

/// Table and column names: lowercase ASCII, starting with a letter, within
/// the dialect's identifier limit.
pub fn validate_identifier(kind: &str, name: &str, dialect: Dialect) -> Result<()> {
    let Some(first) = name.chars().next() else {
        return Err(MigrateError::malformed(format!("{kind} name must not be empty")));
    };

    if !first.is_ascii_lowercase() {
        return Err(MigrateError::malformed(format!(
            "{kind} name '{name}' must start with a lowercase ASCII letter"
        )));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
    {
        return Err(MigrateError::malformed(format!(
            "{kind} name '{name}' contains '{c}', only [a-z0-9_] is allowed"
        )));
    }

    if name.len() > dialect.max_identifier_length() {
        return Err(MigrateError::malformed(format!(
            "{kind} name '{name}' is longer than {} characters on {dialect}",
            dialect.max_identifier_length()
        )));
    }

    Ok(())
}

// Index and constraint names are truncated rather than rejected when too long.
fn validate_derived_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::malformed(format!("{kind} name must not be empty")));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_'))
    {
        return Err(MigrateError::malformed(format!(
            "{kind} name '{name}' contains '{c}', only [a-z0-9_] is allowed"
        )));
    }

    Ok(())
}

pub(crate) fn validate_columns(
    table: &str,
    columns: &[ColumnDescriptor],
    dialect: Dialect,
) -> Result<()> {
    if columns.is_empty() {
        return Err(MigrateError::malformed(format!(
            "table '{table}': at least one column is required"
        )));
    }

    let mut seen = HashSet::new();
    for column in columns {
        column.validate(dialect)?;

        if !seen.insert(column.name.as_str()) {
            return Err(MigrateError::malformed(format!(
                "table '{table}': duplicate column '{}'",
                column.name
            )));
        }
    }

    Ok(())
}

pub(crate) fn validate_column_names(owner: &str, columns: &[String], dialect: Dialect) -> Result<()> {
    if columns.is_empty() {
        return Err(MigrateError::malformed(format!(
            "{owner}: at least one column is required"
        )));
    }

    let mut seen = HashSet::new();
    for column in columns {
        validate_identifier("column", column, dialect)?;

        if !seen.insert(column.as_str()) {
            return Err(MigrateError::malformed(format!(
                "{owner}: duplicate column '{column}'"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> TableDescriptor {
        TableDescriptor::new("users")
            .primary_key_column(ColumnDescriptor::varchar("uuid", 40))
            .column(ColumnDescriptor::varchar("email", 100))
    }

    #[test]
    fn valid_table_passes() {
        assert!(users().validate(Dialect::Postgres).is_ok());
    }

    #[test]
    fn primary_key_name_defaults_to_table() {
        assert_eq!(users().effective_primary_key_name(Dialect::Sqlite), "pk_users");
        assert_eq!(
            users()
                .primary_key_name("pk_people")
                .effective_primary_key_name(Dialect::Sqlite),
            "pk_people"
        );
    }

    #[test]
    fn rejects_bad_identifiers() {
        for name in ["", "Users", "1users", "user-s", "users table"] {
            let table = TableDescriptor::new(name).column(ColumnDescriptor::integer("id"));
            assert!(
                matches!(
                    table.validate(Dialect::Sqlite),
                    Err(MigrateError::MalformedDescriptor(_))
                ),
                "{name:?} should be rejected"
            );
        }

        let long = "t".repeat(64);
        let table = TableDescriptor::new(long).column(ColumnDescriptor::integer("id"));
        assert!(table.validate(Dialect::Postgres).is_err());
        assert!(table.validate(Dialect::MySql).is_ok());
    }

    #[test]
    fn rejects_duplicate_columns() {
        let table = users().column(ColumnDescriptor::integer("email"));
        let err = table.validate(Dialect::Sqlite).unwrap_err();

        assert!(err.to_string().contains("duplicate column 'email'"));
    }

    #[test]
    fn rejects_undeclared_or_nullable_primary_key() {
        let mut table = TableDescriptor::new("t").column(ColumnDescriptor::integer("id"));
        table.primary_key.push("missing".to_owned());
        assert!(table.validate(Dialect::Sqlite).is_err());

        let mut table = TableDescriptor::new("t").column(ColumnDescriptor::integer("id"));
        table.primary_key.push("id".to_owned());
        let err = table.validate(Dialect::Sqlite).unwrap_err();
        assert!(err.to_string().contains("must not be nullable"));
    }

    #[test]
    fn rejects_type_bounds() {
        assert!(ColumnDescriptor::varchar("a", 0).validate(Dialect::Sqlite).is_err());
        assert!(ColumnDescriptor::varchar("a", 4001).validate(Dialect::Sqlite).is_err());
        assert!(ColumnDescriptor::varchar("a", 4000).validate(Dialect::Sqlite).is_ok());
        assert!(ColumnDescriptor::decimal("a", 10, 11).validate(Dialect::Sqlite).is_err());
        assert!(ColumnDescriptor::decimal("a", 39, 2).validate(Dialect::Sqlite).is_err());
        assert!(ColumnDescriptor::decimal("a", 10, 2).validate(Dialect::Sqlite).is_ok());
    }

    #[test]
    fn defaults_must_match_type() {
        let ok = ColumnDescriptor::boolean("active")
            .not_null()
            .default_value(ColumnDefault::Bool(true));
        assert!(ok.validate(Dialect::MySql).is_ok());

        let wrong = ColumnDescriptor::boolean("active").default_value(ColumnDefault::Integer(1));
        assert!(wrong.validate(Dialect::MySql).is_err());

        let on_clob = ColumnDescriptor::clob("body").default_value(ColumnDefault::Text("x".into()));
        assert!(on_clob.validate(Dialect::MySql).is_err());

        let too_long =
            ColumnDescriptor::varchar("code", 2).default_value(ColumnDefault::Text("abc".into()));
        assert!(too_long.validate(Dialect::MySql).is_err());
    }

    #[test]
    fn index_needs_columns() {
        let index = IndexDescriptor::new("users", "users_email");
        assert!(index.validate(Dialect::Sqlite).is_err());

        let index = index.column("email").column("email");
        assert!(index.validate(Dialect::Sqlite).is_err());
    }

    #[test]
    fn index_names_are_truncated_not_rejected() {
        let name = format!("idx_{}", "a".repeat(80));
        let index = IndexDescriptor::new("users", name).column("email");

        assert!(index.validate(Dialect::Postgres).is_ok());
        assert_eq!(index.effective_name(Dialect::Postgres).len(), 63);
    }
}
