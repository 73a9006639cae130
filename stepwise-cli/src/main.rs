use std::{str::FromStr, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sqlx::{pool::PoolConnection, pool::PoolOptions, Database, MySql, Postgres, Sqlite};
use stepwise::{HistoryPolicy, Migrator, MigratorConfig, Session, DEFAULT_HISTORY_TABLE};
use tracing_subscriber::{
    prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

/// Applies pending schema migrations before the application starts.
#[derive(Debug, Parser)]
#[command(name = "stepwise", version, about)]
struct Cli {
    /// Database URL (sqlite:, mysql:, postgres:)
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Table recording completed migrations
    #[arg(long, default_value = DEFAULT_HISTORY_TABLE)]
    history_table: String,

    /// Pending-step selection: contiguous or completed-set
    #[arg(long, default_value_t = HistoryPolicy::Contiguous)]
    policy: HistoryPolicy,

    #[arg(long, default_value_t = 2)]
    max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, default_value_t = 30)]
    acquire_timeout: u64,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply every pending migration (default)
    Run,
    /// Show completed and pending versions without changing the database
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::from_str("info,stepwise=debug")?,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let cli = Cli::parse();
    let scheme = cli
        .database_url
        .split_once(':')
        .map(|(scheme, _)| scheme.to_ascii_lowercase())
        .unwrap_or_default();

    match scheme.as_str() {
        "sqlite" => execute::<Sqlite>(&cli).await,
        "mysql" | "mariadb" => execute::<MySql>(&cli).await,
        "postgres" | "postgresql" => execute::<Postgres>(&cli).await,
        _ => bail!("unsupported database url scheme '{scheme}', expected sqlite, mysql or postgres"),
    }
}

async fn execute<DB>(cli: &Cli) -> Result<()>
where
    DB: Database,
    PoolConnection<DB>: Session,
{
    let pool = PoolOptions::<DB>::new()
        .max_connections(cli.max_connections)
        .acquire_timeout(Duration::from_secs(cli.acquire_timeout))
        .connect(&cli.database_url)
        .await?;

    let config = MigratorConfig::builder()
        .history_table(&cli.history_table)
        .policy(cli.policy)
        .build();
    let migrator = Migrator::new(pool.clone(), stepwise_catalog::registry()?).with_config(config);

    let result = run(&migrator, cli.command.as_ref()).await;
    pool.close().await;

    result
}

async fn run<DB>(migrator: &Migrator<DB>, command: Option<&Command>) -> Result<()>
where
    DB: Database,
    PoolConnection<DB>: Session,
{
    match command {
        None | Some(Command::Run) => {
            let report = migrator.run_pending_migrations().await?;
            tracing::info!(
                applied = ?report.applied,
                already_completed = report.already_completed,
                "migrations complete"
            );
        }
        Some(Command::Status { json: true }) => {
            let status = migrator.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Some(Command::Status { json: false }) => {
            let status = migrator.status().await?;
            let latest = status
                .latest
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_owned());

            println!("dialect:   {}", status.dialect);
            println!("latest:    {latest}");
            println!("completed: {}", join(&status.completed));
            println!("pending:   {}", join(&status.pending));
        }
    }

    Ok(())
}

fn join(versions: &[stepwise::Version]) -> String {
    if versions.is_empty() {
        return "-".to_owned();
    }

    versions
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
