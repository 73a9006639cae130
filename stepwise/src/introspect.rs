//! Read-only catalog queries answering "does this schema object exist?".
//!
//! Names are compared case-insensitively on every engine: both sides of each
//! comparison are lower-cased in SQL, and every name is embedded as an
//! escaped literal.

use std::fmt;

use crate::{dialect::Dialect, error::Result, session::Session};

/// A schema object to look up in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectRef {
    Table(String),
    Column { table: String, column: String },
    Index { table: String, index: String },
    Constraint { table: String, constraint: String },
}

impl ObjectRef {
    pub fn table(table: impl Into<String>) -> Self {
        Self::Table(table.into())
    }

    pub fn column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self::Column {
            table: table.into(),
            column: column.into(),
        }
    }

    pub fn index(table: impl Into<String>, index: impl Into<String>) -> Self {
        Self::Index {
            table: table.into(),
            index: index.into(),
        }
    }

    pub fn constraint(table: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self::Constraint {
            table: table.into(),
            constraint: constraint.into(),
        }
    }

    /// The table the object belongs to (or is).
    pub fn table_name(&self) -> &str {
        match self {
            Self::Table(table)
            | Self::Column { table, .. }
            | Self::Index { table, .. }
            | Self::Constraint { table, .. } => table,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(table) => write!(f, "table {table}"),
            Self::Column { table, column } => write!(f, "column {table}.{column}"),
            Self::Index { table, index } => write!(f, "index {index} on {table}"),
            Self::Constraint { table, constraint } => {
                write!(f, "constraint {constraint} on {table}")
            }
        }
    }
}

/// Builds the `COUNT(*)` catalog query for an object. A non-zero count means
/// the object exists.
pub fn exists_query(dialect: Dialect, object: &ObjectRef) -> String {
    let lit = |value: &str| dialect.literal(value);

    match (dialect, object) {
        (Dialect::Sqlite, ObjectRef::Table(table)) => format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND LOWER(name) = LOWER({})",
            lit(table)
        ),
        (Dialect::Sqlite, ObjectRef::Column { table, column }) => format!(
            "SELECT COUNT(*) FROM pragma_table_info({}) WHERE LOWER(name) = LOWER({})",
            lit(table),
            lit(column)
        ),
        (Dialect::Sqlite, ObjectRef::Index { table, index }) => format!(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND LOWER(tbl_name) = LOWER({}) AND LOWER(name) = LOWER({})",
            lit(table),
            lit(index)
        ),
        // SQLite keeps no catalog of named constraints; look for the name in
        // the table definition instead.
        (Dialect::Sqlite, ObjectRef::Constraint { table, constraint }) => {
            let name = constraint
                .to_lowercase()
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            let patterns = [
                format!("%constraint \"{name}\"%"),
                format!("%constraint `{name}`%"),
                format!("%constraint {name} %"),
            ]
            .iter()
            .map(|pattern| format!("LOWER(sql) LIKE {} ESCAPE '\\'", lit(pattern)))
            .collect::<Vec<_>>()
            .join(" OR ");

            format!(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND LOWER(name) = LOWER({}) AND ({patterns})",
                lit(table)
            )
        }
        (Dialect::Postgres, ObjectRef::Table(table)) => format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema() AND LOWER(table_name) = LOWER({})",
            lit(table)
        ),
        (Dialect::Postgres, ObjectRef::Column { table, column }) => format!(
            "SELECT COUNT(*) FROM information_schema.columns WHERE table_schema = current_schema() AND LOWER(table_name) = LOWER({}) AND LOWER(column_name) = LOWER({})",
            lit(table),
            lit(column)
        ),
        (Dialect::Postgres, ObjectRef::Index { table, index }) => format!(
            "SELECT COUNT(*) FROM pg_indexes WHERE schemaname = current_schema() AND LOWER(tablename) = LOWER({}) AND LOWER(indexname) = LOWER({})",
            lit(table),
            lit(index)
        ),
        (Dialect::Postgres, ObjectRef::Constraint { table, constraint }) => format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints WHERE table_schema = current_schema() AND LOWER(table_name) = LOWER({}) AND LOWER(constraint_name) = LOWER({})",
            lit(table),
            lit(constraint)
        ),
        (Dialect::MySql, ObjectRef::Table(table)) => format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = DATABASE() AND LOWER(table_name) = LOWER({})",
            lit(table)
        ),
        (Dialect::MySql, ObjectRef::Column { table, column }) => format!(
            "SELECT COUNT(*) FROM information_schema.columns WHERE table_schema = DATABASE() AND LOWER(table_name) = LOWER({}) AND LOWER(column_name) = LOWER({})",
            lit(table),
            lit(column)
        ),
        (Dialect::MySql, ObjectRef::Index { table, index }) => format!(
            "SELECT COUNT(*) FROM information_schema.statistics WHERE table_schema = DATABASE() AND LOWER(table_name) = LOWER({}) AND LOWER(index_name) = LOWER({})",
            lit(table),
            lit(index)
        ),
        (Dialect::MySql, ObjectRef::Constraint { table, constraint }) => format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints WHERE table_schema = DATABASE() AND LOWER(table_name) = LOWER({}) AND LOWER(constraint_name) = LOWER({})",
            lit(table),
            lit(constraint)
        ),
    }
}

/// Lists a table's column names, lower-cased, in declaration order.
pub fn columns_query(dialect: Dialect, table: &str) -> String {
    let table = dialect.literal(table);

    match dialect {
        Dialect::Sqlite => {
            format!("SELECT LOWER(name) FROM pragma_table_info({table}) ORDER BY cid")
        }
        Dialect::Postgres => format!(
            "SELECT LOWER(column_name::text) FROM information_schema.columns WHERE table_schema = current_schema() AND LOWER(table_name) = LOWER({table}) ORDER BY ordinal_position"
        ),
        Dialect::MySql => format!(
            "SELECT CAST(LOWER(column_name) AS CHAR) FROM information_schema.columns WHERE table_schema = DATABASE() AND LOWER(table_name) = LOWER({table}) ORDER BY ordinal_position"
        ),
    }
}

/// Lists the tables, lower-cased, holding an index named `index` anywhere in
/// the current schema.
pub fn index_tables_query(dialect: Dialect, index: &str) -> String {
    let index = dialect.literal(index);

    match dialect {
        Dialect::Sqlite => format!(
            "SELECT DISTINCT LOWER(tbl_name) FROM sqlite_master WHERE type = 'index' AND LOWER(name) = LOWER({index})"
        ),
        Dialect::Postgres => format!(
            "SELECT DISTINCT LOWER(tablename::text) FROM pg_indexes WHERE schemaname = current_schema() AND LOWER(indexname) = LOWER({index})"
        ),
        Dialect::MySql => format!(
            "SELECT DISTINCT CAST(LOWER(table_name) AS CHAR) FROM information_schema.statistics WHERE table_schema = DATABASE() AND LOWER(index_name) = LOWER({index})"
        ),
    }
}

/// Counts primary keys on a table, whatever their name.
pub fn primary_key_query(dialect: Dialect, table: &str) -> String {
    let table = dialect.literal(table);

    match dialect {
        Dialect::Sqlite => format!("SELECT COUNT(*) FROM pragma_table_info({table}) WHERE pk > 0"),
        Dialect::Postgres => format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints WHERE table_schema = current_schema() AND LOWER(table_name) = LOWER({table}) AND constraint_type = 'PRIMARY KEY'"
        ),
        Dialect::MySql => format!(
            "SELECT COUNT(*) FROM information_schema.table_constraints WHERE table_schema = DATABASE() AND LOWER(table_name) = LOWER({table}) AND constraint_type = 'PRIMARY KEY'"
        ),
    }
}

/// Answers existence questions against the live catalog of one session.
pub struct Introspector<'a> {
    session: &'a mut dyn Session,
    dialect: Dialect,
}

impl<'a> Introspector<'a> {
    pub fn new(session: &'a mut dyn Session, dialect: Dialect) -> Self {
        Self { session, dialect }
    }

    pub async fn exists(&mut self, object: &ObjectRef) -> Result<bool> {
        let count = self
            .session
            .fetch_count(&exists_query(self.dialect, object))
            .await?;

        Ok(count > 0)
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        self.exists(&ObjectRef::table(table)).await
    }

    pub async fn column_exists(&mut self, table: &str, column: &str) -> Result<bool> {
        self.exists(&ObjectRef::column(table, column)).await
    }

    pub async fn index_exists(&mut self, table: &str, index: &str) -> Result<bool> {
        self.exists(&ObjectRef::index(table, index)).await
    }

    /// Tables holding an index with this name, on any table of the schema.
    pub async fn index_tables(&mut self, index: &str) -> Result<Vec<String>> {
        self.session
            .fetch_strings(&index_tables_query(self.dialect, index))
            .await
    }

    pub async fn constraint_exists(&mut self, table: &str, constraint: &str) -> Result<bool> {
        self.exists(&ObjectRef::constraint(table, constraint)).await
    }

    pub async fn has_primary_key(&mut self, table: &str) -> Result<bool> {
        let count = self
            .session
            .fetch_count(&primary_key_query(self.dialect, table))
            .await?;

        Ok(count > 0)
    }

    /// Lower-cased column names; empty when the table does not exist.
    pub async fn columns(&mut self, table: &str) -> Result<Vec<String>> {
        self.session
            .fetch_strings(&columns_query(self.dialect, table))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_catalog_queries() {
        assert_eq!(
            exists_query(Dialect::Sqlite, &ObjectRef::table("users")),
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND LOWER(name) = LOWER('users')"
        );
        assert_eq!(
            exists_query(Dialect::Sqlite, &ObjectRef::column("users", "email")),
            "SELECT COUNT(*) FROM pragma_table_info('users') WHERE LOWER(name) = LOWER('email')"
        );

        let index = exists_query(Dialect::Sqlite, &ObjectRef::index("users", "users_email"));
        assert!(index.contains("type = 'index'"));
        assert!(index.contains("LOWER(tbl_name) = LOWER('users')"));
    }

    #[test]
    fn sqlite_constraint_lookup_escapes_like_wildcards() {
        let sql = exists_query(Dialect::Sqlite, &ObjectRef::constraint("users", "PK_Users"));

        assert!(sql.contains("'%constraint \"pk\\_users\"%' ESCAPE '\\'"));
        assert!(sql.contains("'%constraint `pk\\_users`%'"));
    }

    #[test]
    fn postgres_queries_are_schema_scoped() {
        for object in [
            ObjectRef::table("users"),
            ObjectRef::column("users", "email"),
            ObjectRef::index("users", "users_email"),
            ObjectRef::constraint("users", "pk_users"),
        ] {
            assert!(exists_query(Dialect::Postgres, &object).contains("current_schema()"));
        }

        assert!(exists_query(Dialect::Postgres, &ObjectRef::index("users", "users_email"))
            .contains("FROM pg_indexes"));
        assert!(columns_query(Dialect::Postgres, "users").contains("column_name::text"));
    }

    #[test]
    fn index_owner_lookup_ignores_the_table() {
        let pg = index_tables_query(Dialect::Postgres, "users_email");
        assert_eq!(
            pg,
            "SELECT DISTINCT LOWER(tablename::text) FROM pg_indexes WHERE schemaname = current_schema() AND LOWER(indexname) = LOWER('users_email')"
        );

        let sqlite = index_tables_query(Dialect::Sqlite, "users_email");
        assert!(sqlite.contains("type = 'index'"));
        assert!(!sqlite.contains("LOWER(tbl_name) = "));
    }

    #[test]
    fn mysql_queries_are_database_scoped() {
        let sql = exists_query(Dialect::MySql, &ObjectRef::index("users", "users_email"));

        assert!(sql.contains("information_schema.statistics"));
        assert!(sql.contains("table_schema = DATABASE()"));
        assert!(primary_key_query(Dialect::MySql, "users").contains("'PRIMARY KEY'"));
    }

    #[test]
    fn names_are_escaped_literals() {
        let sql = exists_query(Dialect::Postgres, &ObjectRef::table("o'neil"));
        assert!(sql.ends_with("LOWER('o''neil')"));

        let sql = exists_query(Dialect::MySql, &ObjectRef::table("a\\b"));
        assert!(sql.ends_with("LOWER('a\\\\b')"));
    }

    #[test]
    fn displays_object() {
        assert_eq!(ObjectRef::table("users").to_string(), "table users");
        assert_eq!(
            ObjectRef::index("users", "users_email").to_string(),
            "index users_email on users"
        );
        assert_eq!(ObjectRef::column("users", "email").table_name(), "users");
    }
}
