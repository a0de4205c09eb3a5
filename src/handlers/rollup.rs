use axum::{
    Json,
    extract::{Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::handlers::{ApiError, failure, require_day, valid_day};
use crate::models::query::{BackfillRequest, RollupRunQuery, non_empty};

/// Run the rollup now instead of waiting for the next timer tick.
///
/// A `today` override can hold the run back to an earlier day but never
/// past the reference-timezone day, so the current day is not sealed early.
pub async fn run_rollup(
    State(state): State<AppState>,
    Query(query): Query<RollupRunQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let real_today = state.engine.today();
    let today = match query.today {
        Some(day) => valid_day(day)?.min(real_today),
        None => real_today,
    };
    let report = state.engine.run_once(today).await.map_err(failure)?;
    let success = report.failure.is_none();
    let status = if success { "ROLLUP_RUN_COMPLETE" } else { "ROLLUP_STAGE_FAILED" };
    Ok(Json(json!({
        "success": success,
        "status": status,
        "report": report,
    })))
}

pub async fn backfill_first_visit(
    State(state): State<AppState>,
    Json(req): Json<BackfillRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(voter) = non_empty(&req.voter_we_vote_id) {
        let day = req.from.map(valid_day).transpose()?;
        let updated = state
            .db
            .update_first_visit_today_for_voter(voter, day)
            .map_err(failure)?;
        tracing::info!("first-visit backfill for {voter}: {updated} actions marked");
        return Ok(Json(json!({
            "success": true,
            "status": "FIRST_VISIT_BACKFILL_VOTER",
            "updated": updated,
        })));
    }

    let from = require_day(req.from, "from")?;
    let through = match req.through {
        Some(day) => valid_day(day)?,
        None => from,
    };

    let updated = state
        .db
        .update_first_visit_today(from, through)
        .map_err(failure)?;
    tracing::info!("first-visit backfill {from}..={through}: {updated} actions marked");
    Ok(Json(json!({
        "success": true,
        "status": "FIRST_VISIT_BACKFILL_RANGE",
        "updated": updated,
    })))
}
