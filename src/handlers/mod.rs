pub mod actions;
pub mod health;
pub mod metrics;
pub mod processing;
pub mod rollup;

use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

use crate::date::is_valid_date_as_integer;
use crate::error::AnalyticsError;

/// Failure envelope: `{success: false, status}` with a matching HTTP code.
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn failure(err: AnalyticsError) -> ApiError {
    let code = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!("request failed: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(json!({ "success": false, "status": err.status() })))
}

pub(crate) fn require_day(day: Option<u32>, field: &'static str) -> Result<u32, ApiError> {
    let day = day.ok_or(AnalyticsError::MissingField(field)).map_err(failure)?;
    valid_day(day)
}

pub(crate) fn valid_day(day: u32) -> Result<u32, ApiError> {
    if is_valid_date_as_integer(day) {
        Ok(day)
    } else {
        Err(failure(AnalyticsError::InvalidDate(day)))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::response::{IntoResponse, Response};
    use serde_json::Value;
    use std::sync::Arc;

    use crate::AppState;
    use crate::analytics_db::AnalyticsDb;
    use crate::config::AnalyticsConfig;
    use crate::lookup::StaticDirectory;
    use crate::rollup::RollupEngine;

    pub fn state_with(directory: StaticDirectory) -> AppState {
        let config = AnalyticsConfig::default();
        let db = Arc::new(AnalyticsDb::open_in_memory().unwrap());
        let directory = Arc::new(directory);
        let engine = Arc::new(RollupEngine::new(db.clone(), directory.clone(), config.rollup.clone()));
        AppState {
            db,
            directory,
            engine,
            config: Arc::new(config),
        }
    }

    pub fn state() -> AppState {
        state_with(StaticDirectory::default())
    }

    pub async fn body_json(response: impl IntoResponse) -> (u16, Value) {
        let response: Response = response.into_response();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }
}
