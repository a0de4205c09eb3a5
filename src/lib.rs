pub mod analytics_db;
pub mod config;
pub mod counts;
pub mod date;
pub mod error;
pub mod handlers;
pub mod ingest;
pub mod lookup;
pub mod models;
pub mod query_builder;
pub mod rollup;

use std::sync::Arc;

use analytics_db::AnalyticsDb;
use config::AnalyticsConfig;
use lookup::Directory;
use rollup::RollupEngine;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<AnalyticsDb>,
    pub directory: Arc<dyn Directory>,
    pub engine: Arc<RollupEngine>,
    pub config: Arc<AnalyticsConfig>,
}
