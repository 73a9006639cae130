use std::{
    collections::BTreeSet,
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sqlx::{pool::PoolConnection, Database, Pool};
use tracing::Instrument;

use crate::{
    config::{HistoryPolicy, MigratorConfig},
    dialect::Dialect,
    error::{MigrateError, Result},
    history::HistoryStore,
    registry::{RegisteredStep, Registry, Version},
    session::Session,
    step::{Context, StepState},
};

/// Overall status of the most recent run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// A point-in-time view of the runner, for the host process.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationState {
    pub status: RunStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Steps selected for this run.
    pub total: usize,
    /// Steps of this run that completed and were recorded.
    pub completed: usize,
    pub current: Option<(Version, StepState)>,
    /// Every step selected for this run, starting `Pending`.
    pub steps: Vec<(Version, StepState)>,
    pub error: Option<String>,
}

impl MigrationState {
    fn mark(&mut self, version: Version, step_state: StepState) {
        self.current = Some((version, step_state));
        if let Some(entry) = self.steps.iter_mut().find(|(v, _)| *v == version) {
            entry.1 = step_state;
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub dialect: Dialect,
    /// Versions applied by this run, in execution order.
    pub applied: Vec<Version>,
    /// Versions that were already completed before the run.
    pub already_completed: usize,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Read-only view of the database's migration progress.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatus {
    pub dialect: Dialect,
    pub completed: Vec<Version>,
    pub pending: Vec<Version>,
    pub latest: Option<Version>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Brings a database up to the latest registered version.
pub struct Migrator<DB: Database> {
    pool: Pool<DB>,
    registry: Registry,
    config: MigratorConfig,
    state: Arc<RwLock<MigrationState>>,
}

impl<DB> Migrator<DB>
where
    DB: Database,
    PoolConnection<DB>: Session,
{
    pub fn new(pool: Pool<DB>, registry: Registry) -> Self {
        Self {
            pool,
            registry,
            config: MigratorConfig::default(),
            state: Arc::default(),
        }
    }

    pub fn with_config(mut self, config: MigratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    pub fn dialect(&self) -> Result<Dialect> {
        Dialect::from_database_name(DB::NAME)
    }

    pub fn state(&self) -> MigrationState {
        self.state.read().clone()
    }

    /// Applies every pending step in ascending version order, recording each
    /// one before the next starts. Stops at the first failure; the next call
    /// resumes from the failed step.
    pub async fn run_pending_migrations(&self) -> Result<RunReport> {
        let started = Instant::now();

        self.update(|state| {
            *state = MigrationState {
                status: RunStatus::Running,
                started_at: Some(Utc::now()),
                ..Default::default()
            };
        });

        let result = self.run(started).await;

        self.update(|state| {
            state.finished_at = Some(Utc::now());
            match &result {
                Ok(_) => {
                    state.status = RunStatus::Succeeded;
                    state.current = None;
                }
                Err(err) => {
                    state.status = RunStatus::Failed;
                    state.error = Some(err.to_string());
                }
            }
        });

        match &result {
            Ok(report) if report.is_noop() => {
                tracing::info!(
                    dialect = %report.dialect,
                    completed = report.already_completed,
                    "database schema is up to date"
                );
            }
            Ok(report) => {
                tracing::info!(
                    dialect = %report.dialect,
                    applied = report.applied.len(),
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "database schema migrated"
                );
            }
            Err(err) => {
                tracing::error!(error = %err, "database schema migration failed");
            }
        }

        result
    }

    /// Completed and pending versions, without changing the database.
    pub async fn status(&self) -> Result<MigrationStatus> {
        let dialect = self.dialect()?;
        let store = HistoryStore::new(&self.config.history_table);

        let completed = {
            let mut conn = self.pool.acquire().await?;
            let mut ctx = Context::new(&mut conn, dialect);
            store.completed_versions(&mut ctx).await?
        };

        let pending = plan(&self.registry, &completed, self.config.policy)?
            .into_iter()
            .map(|step| step.version)
            .collect();

        Ok(MigrationStatus {
            dialect,
            completed: completed.into_iter().collect(),
            pending,
            latest: self.registry.latest(),
        })
    }

    async fn run(&self, started: Instant) -> Result<RunReport> {
        let dialect = self.dialect()?;
        let store = HistoryStore::new(&self.config.history_table);

        let completed = {
            let mut conn = self.pool.acquire().await?;
            let mut ctx = Context::new(&mut conn, dialect);
            store.ensure(&mut ctx).await?;
            store.completed_versions(&mut ctx).await?
        };

        let pending = plan(&self.registry, &completed, self.config.policy)?;

        tracing::debug!(
            completed = completed.len(),
            pending = pending.len(),
            policy = %self.config.policy,
            "planned migration run"
        );

        self.update(|state| {
            state.total = pending.len();
            state.steps = pending
                .iter()
                .map(|step| (step.version, StepState::Pending))
                .collect();
        });

        let mut applied = Vec::with_capacity(pending.len());
        for step in pending {
            let span = tracing::info_span!(
                "migration",
                version = %step.version,
                description = %step.description
            );

            self.apply(step, &store, dialect)
                .instrument(span)
                .await
                .map_err(|err| MigrateError::Step {
                    version: step.version,
                    description: step.description.clone(),
                    source: Box::new(err),
                })?;

            applied.push(step.version);
        }

        Ok(RunReport {
            dialect,
            applied,
            already_completed: completed.len(),
            elapsed: started.elapsed(),
        })
    }

    async fn apply(&self, step: &RegisteredStep, store: &HistoryStore, dialect: Dialect) -> Result<()> {
        let started = Instant::now();
        self.update(|state| state.mark(step.version, StepState::Running));

        let result = async {
            {
                let mut conn = self.pool.acquire().await?;
                let mut ctx = Context::new(&mut conn, dialect);
                step.step.apply(&mut ctx).await?;
            }

            let mut conn = self.pool.acquire().await?;
            let mut ctx = Context::new(&mut conn, dialect);
            store.record_completed(&mut ctx, step.version).await
        }
        .await;

        match &result {
            Ok(()) => {
                self.update(|state| {
                    state.mark(step.version, StepState::Succeeded);
                    state.completed += 1;
                });
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "migration applied"
                );
            }
            Err(err) => {
                self.update(|state| state.mark(step.version, StepState::Failed));
                tracing::error!(error = %err, "migration failed");
            }
        }

        result
    }

    fn update(&self, f: impl FnOnce(&mut MigrationState)) {
        f(&mut *self.state.write());
    }
}

/// Applies every pending step of `registry` with the default configuration.
pub async fn run_pending_migrations<DB>(pool: &Pool<DB>, registry: Registry) -> Result<RunReport>
where
    DB: Database,
    PoolConnection<DB>: Session,
{
    Migrator::new(pool.clone(), registry)
        .run_pending_migrations()
        .await
}

/// Selects the steps still to run, in ascending version order.
pub fn plan<'r>(
    registry: &'r Registry,
    completed: &BTreeSet<Version>,
    policy: HistoryPolicy,
) -> Result<Vec<&'r RegisteredStep>> {
    if let Some(&database) = completed.last() {
        let latest = registry.latest().unwrap_or(Version::new(0));
        if database > latest {
            return Err(MigrateError::DatabaseAhead { database, latest });
        }
    }

    for version in completed.iter().filter(|v| !registry.contains(**v)) {
        tracing::warn!(%version, "ignoring completed version unknown to this build");
    }

    match policy {
        HistoryPolicy::CompletedSet => Ok(registry
            .steps()
            .iter()
            .filter(|step| !completed.contains(&step.version))
            .collect()),
        HistoryPolicy::Contiguous => {
            let steps = registry.steps();
            let Some(first_pending) = steps
                .iter()
                .position(|step| !completed.contains(&step.version))
            else {
                return Ok(Vec::new());
            };

            if let Some(found) = steps[first_pending..]
                .iter()
                .find(|step| completed.contains(&step.version))
            {
                return Err(MigrateError::HistoryGap {
                    missing: steps[first_pending].version,
                    found: found.version,
                });
            }

            Ok(steps[first_pending..].iter().collect())
        }
    }
}
