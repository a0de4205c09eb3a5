use axum::{Router, routing::get, routing::post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use civic_analytics::AppState;
use civic_analytics::analytics_db::AnalyticsDb;
use civic_analytics::config::AnalyticsConfig;
use civic_analytics::handlers;
use civic_analytics::lookup;
use civic_analytics::rollup::{self, RollupEngine};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("civic_analytics=debug,tower_http=debug")
        }))
        .init();

    let config_path = std::env::var("CIVIC_ANALYTICS_CONFIG")
        .unwrap_or_else(|_| "./civic_analytics.toml".to_string());
    let config = AnalyticsConfig::load(&config_path)?;

    let db = Arc::new(AnalyticsDb::open(&config.storage.db_path)?);
    tracing::info!("analytics db opened at {}", config.storage.db_path);

    let directory = lookup::directory_from_config(&config.lookups)?;
    let engine = Arc::new(RollupEngine::new(
        db.clone(),
        directory.clone(),
        config.rollup.clone(),
    ));

    // Spawn background rollup
    rollup::spawn_rollup_engine(engine.clone());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let state = AppState {
        db,
        directory,
        engine,
        config: Arc::new(config),
    };

    let app = Router::new()
        // Ingestion and raw action queries
        .route(
            "/api/v1/actions",
            get(handlers::actions::list_actions).post(handlers::actions::record_action),
        )
        .route("/api/v1/actions/count", get(handlers::actions::count_actions))
        .route(
            "/api/v1/actions/attach-voter",
            post(handlers::actions::attach_voter),
        )
        .route(
            "/api/v1/actions/dates",
            get(handlers::metrics::dates_with_actions),
        )
        .route(
            "/api/v1/actions/voters-with-changes",
            get(handlers::metrics::voters_with_changes),
        )
        // Rollup progress
        .route(
            "/api/v1/processing/{day}",
            get(handlers::processing::get_processing_status),
        )
        .route(
            "/api/v1/processed",
            get(handlers::processing::list_processed).delete(handlers::processing::delete_processed),
        )
        .route("/api/v1/rollup/run", post(handlers::rollup::run_rollup))
        .route(
            "/api/v1/first-visit/backfill",
            post(handlers::rollup::backfill_first_visit),
        )
        // Summary tables
        .route(
            "/api/v1/metrics/organizations/{organization_we_vote_id}/daily",
            get(handlers::metrics::organization_daily),
        )
        .route(
            "/api/v1/metrics/organization-elections",
            get(handlers::metrics::organization_election),
        )
        .route("/api/v1/metrics/sitewide/daily", get(handlers::metrics::sitewide_daily))
        .route(
            "/api/v1/metrics/sitewide/elections",
            get(handlers::metrics::sitewide_election),
        )
        .route(
            "/api/v1/metrics/elections/{google_civic_election_id}/organizations",
            get(handlers::metrics::organizations_with_election_activity),
        )
        .route(
            "/api/v1/metrics/voters/{voter_we_vote_id}",
            get(handlers::metrics::voter),
        )
        .route(
            "/api/v1/metrics/voters/{voter_we_vote_id}/updated",
            get(handlers::metrics::voter_updated_on),
        )
        // Health
        .route("/healthz", get(handlers::health::healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("civic-analytics listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
