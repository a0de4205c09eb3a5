use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::error::AnalyticsError;
use crate::handlers::{ApiError, failure};
use crate::ingest;
use crate::models::action::{AttachVoterRequest, RecordActionRequest};
use crate::models::query::{ActionListQuery, CountColumn, non_empty};

pub async fn record_action(
    State(state): State<AppState>,
    Json(mut req): Json<RecordActionRequest>,
) -> impl IntoResponse {
    if req.organization_id.is_none() {
        if let Some(org) = non_empty(&req.organization_we_vote_id) {
            req.organization_id = state.directory.organization_id(org).await;
        }
    }
    let outcome = ingest::record_action(
        &state.db,
        &req,
        chrono::Utc::now(),
        state.config.rollup.reference_utc_offset_hours,
    );
    let code = if outcome.action_saved {
        StatusCode::CREATED
    } else if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (code, Json(outcome))
}

pub async fn list_actions(
    State(state): State<AppState>,
    Query(query): Query<ActionListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.to_filter().map_err(failure)?;
    let actions = state
        .db
        .list_actions(&filter, query.distinct_for_members, query.limit)
        .map_err(failure)?;
    let found = !actions.is_empty();
    let status = if found { "ACTIONS_RETRIEVED" } else { "NO_ACTIONS_FOUND" };
    Ok(Json(json!({
        "success": true,
        "status": status,
        "found": found,
        "actions": actions,
    })))
}

pub async fn count_actions(
    State(state): State<AppState>,
    Query(query): Query<ActionListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let column = if query.distinct_for_members {
        CountColumn::Voters
    } else {
        CountColumn::Rows
    };
    let filter = query.to_filter().map_err(failure)?;
    let count = state
        .db
        .count_distinct(&filter, column)
        .map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "ACTIONS_COUNTED",
        "count": count,
    })))
}

pub async fn attach_voter(
    State(state): State<AppState>,
    Json(req): Json<AttachVoterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.voter_device_id.trim().is_empty() {
        return Err(failure(AnalyticsError::MissingField("voter_device_id")));
    }
    if req.voter_we_vote_id.trim().is_empty() {
        return Err(failure(AnalyticsError::MissingField("voter_we_vote_id")));
    }
    let updated = state
        .db
        .attach_voter_to_device(req.voter_device_id.trim(), req.voter_we_vote_id.trim(), req.voter_id)
        .map_err(failure)?;
    tracing::debug!("attached {updated} actions to {}", req.voter_we_vote_id);
    Ok(Json(json!({
        "success": true,
        "status": "VOTER_ATTACHED_TO_DEVICE_ACTIONS",
        "updated": updated,
    })))
}
