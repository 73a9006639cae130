use crate::{dialect::Dialect, registry::Version};

/// Errors raised while building, inspecting or applying schema migrations.
///
/// None of these are retried by the engine. A failed run leaves every step
/// that already succeeded recorded in the history table, and the next run
/// resumes from the first step that did not.
#[derive(thiserror::Error, Debug)]
pub enum MigrateError {
    /// The database could not be reached (I/O, TLS, pool exhausted or closed).
    #[error("cannot reach database: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// The database rejected a statement or a catalog query.
    #[error("database: {0}")]
    Database(#[source] sqlx::Error),

    /// An existing schema object has a shape the step did not expect.
    #[error("schema conflict on {object}: {detail}")]
    SchemaConflict { object: String, detail: String },

    /// A schema object descriptor cannot be turned into valid DDL.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(String),

    /// The dialect has no syntax for the requested operation.
    #[error("{operation} is not supported by {dialect}")]
    Unsupported {
        dialect: Dialect,
        operation: &'static str,
    },

    /// The sqlx driver is not one of SQLite, MySQL or PostgreSQL.
    #[error("'{0}' not supported, consider using SQLite, PostgreSQL or MySQL")]
    UnsupportedDatabase(String),

    /// The step registry was declared inconsistently.
    #[error("invalid registry: {0}")]
    InvalidRegistry(String),

    /// The history table holds a row the engine cannot interpret.
    #[error("invalid history record: {0}")]
    InvalidHistory(String),

    /// A later version completed while an earlier one never did.
    #[error("migration history has a gap: {missing} never completed but {found} did")]
    HistoryGap { missing: Version, found: Version },

    /// The database was migrated by a build that knows more steps than this one.
    #[error("database is at version {database}, newer than the latest known migration {latest}")]
    DatabaseAhead { database: Version, latest: Version },

    /// A migration step failed; `source` carries the underlying cause.
    #[error("migration {version} ({description}) failed: {source}")]
    Step {
        version: Version,
        description: String,
        source: Box<MigrateError>,
    },
}

impl MigrateError {
    /// The innermost error, looking through [`MigrateError::Step`] wrappers.
    pub fn root(&self) -> &MigrateError {
        match self {
            Self::Step { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self.root(), Self::Connectivity(_))
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDescriptor(msg.into())
    }

    pub(crate) fn conflict(object: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaConflict {
            object: object.into(),
            detail: detail.into(),
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connectivity(err),
            _ => Self::Database(err),
        }
    }
}

pub type Result<T, E = MigrateError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_timeout_is_connectivity() {
        let err = MigrateError::from(sqlx::Error::PoolTimedOut);
        assert!(err.is_connectivity());

        let err = MigrateError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, MigrateError::Database(_)));
    }

    #[test]
    fn step_error_reports_version_and_cause() {
        let err = MigrateError::Step {
            version: Version::new(2),
            description: "Create index users_email".to_owned(),
            source: Box::new(MigrateError::from(sqlx::Error::PoolClosed)),
        };

        let message = err.to_string();
        assert!(message.starts_with("migration 2 (Create index users_email) failed"));
        assert!(err.is_connectivity());
    }
}
