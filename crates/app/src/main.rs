use std::{sync::Arc, time::Duration};

use chrono::{Days, Utc};
use chrono_tz::Tz;
use engine::Engine;
use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "spendwise={level},server={level},engine={level},migration={level}",
            level = settings.app.level
        ))
        .init();

    let Some(server) = settings.server else {
        tracing::warn!("no server settings found, nothing to run");
        return Ok(());
    };

    tracing::info!("Found server settings...");
    let db = parse_database(&server.database).await?;
    let engine = Arc::new(Engine::builder().database(db).build().await?);
    let timezone = settings.app.timezone;

    {
        let engine = Arc::clone(&engine);
        let bind = server.bind.unwrap_or_else(|| "127.0.0.1".to_string());
        let addr = format!("{}:{}", bind, server.port);
        tasks.spawn(async move {
            server::run(engine, timezone, &addr).await;
        });
    }

    if let Some(purge) = settings.purge {
        tracing::info!(
            interval_secs = purge.interval_secs,
            retention_days = purge.retention_days,
            "Found purge settings..."
        );
        tasks.spawn(purge_expired(
            engine,
            timezone,
            Duration::from_secs(purge.interval_secs.max(1)),
            Days::new(u64::from(purge.retention_days)),
        ));
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

/// Periodically delete expenses dated before `retention` ago.
async fn purge_expired(engine: Arc<Engine>, timezone: Tz, every: Duration, retention: Days) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let now = Utc::now().with_timezone(&timezone).naive_local();
        let Some(cutoff) = now.checked_sub_days(retention) else {
            tracing::warn!("purge retention reaches before the calendar start, skipping");
            continue;
        };
        if let Err(err) = engine.purge_expenses_before(cutoff).await {
            tracing::error!("failed to purge expired expenses: {err}");
        }
    }
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
