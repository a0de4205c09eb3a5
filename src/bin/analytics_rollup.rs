use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use civic_analytics::analytics_db::AnalyticsDb;
use civic_analytics::config::AnalyticsConfig;
use civic_analytics::lookup;
use civic_analytics::rollup::RollupEngine;

/// Drive the rollup until it is caught up, then exit. Meant for cron.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("civic_analytics=debug")
        }))
        .init();

    let config_path = std::env::var("CIVIC_ANALYTICS_CONFIG")
        .unwrap_or_else(|_| "./civic_analytics.toml".to_string());
    let config = AnalyticsConfig::load(&config_path)?;

    let db = Arc::new(AnalyticsDb::open(&config.storage.db_path)?);
    tracing::info!("analytics db opened at {}", config.storage.db_path);
    let directory = lookup::directory_from_config(&config.lookups)?;
    let engine = RollupEngine::new(db, directory, config.rollup.clone());

    let today = engine.today();
    tracing::info!("analytics-rollup starting (today={today})");
    let mut completed = Vec::new();
    loop {
        let report = engine.run_once(today).await?;
        completed.extend(report.days_completed.iter().copied());
        if let Some(failure) = report.failure {
            anyhow::bail!(
                "stage {} failed for {}: {}",
                failure.stage.kind_of_process(),
                failure.date_as_integer,
                failure.error
            );
        }
        // Without a stop outcome the tick limit was hit and work remains.
        if let Some(outcome) = report.stopped_on {
            tracing::info!("caught up after {} days: {outcome:?}", completed.len());
            break;
        }
    }

    Ok(())
}
