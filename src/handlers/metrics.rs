//! Read side of the summary tables and the rollup's event-store helpers.

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::handlers::{ApiError, failure, require_day, valid_day};
use crate::models::query::{DayQuery, DayRangeQuery, ElectionQuery};

fn optional_range(query: &DayRangeQuery) -> Result<(Option<u32>, Option<u32>), ApiError> {
    let from = query.from.map(valid_day).transpose()?;
    let through = query.through.map(valid_day).transpose()?;
    Ok((from, through))
}

pub async fn organization_daily(
    State(state): State<AppState>,
    Path(organization_we_vote_id): Path<String>,
    Query(query): Query<DayRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (from, through) = optional_range(&query)?;
    let metrics = state
        .db
        .list_organization_daily_metrics(&organization_we_vote_id, from, through)
        .map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "ORGANIZATION_DAILY_METRICS_RETRIEVED",
        "found": !metrics.is_empty(),
        "metrics": metrics,
    })))
}

pub async fn organization_election(
    State(state): State<AppState>,
    Query(query): Query<ElectionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics = state
        .db
        .list_organization_election_metrics(query.google_civic_election_id.filter(|id| *id > 0))
        .map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "ORGANIZATION_ELECTION_METRICS_RETRIEVED",
        "found": !metrics.is_empty(),
        "metrics": metrics,
    })))
}

pub async fn sitewide_daily(
    State(state): State<AppState>,
    Query(query): Query<DayRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let (from, through) = optional_range(&query)?;
    let metrics = state
        .db
        .list_sitewide_daily_metrics(from, through)
        .map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "SITEWIDE_DAILY_METRICS_RETRIEVED",
        "found": !metrics.is_empty(),
        "metrics": metrics,
    })))
}

pub async fn sitewide_election(
    State(state): State<AppState>,
    Query(query): Query<ElectionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics = state
        .db
        .list_sitewide_election_metrics(query.google_civic_election_id.filter(|id| *id > 0))
        .map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "SITEWIDE_ELECTION_METRICS_RETRIEVED",
        "found": !metrics.is_empty(),
        "metrics": metrics,
    })))
}

pub async fn voter(
    State(state): State<AppState>,
    Path(voter_we_vote_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let metrics = state
        .db
        .get_sitewide_voter_metrics(&voter_we_vote_id)
        .map_err(failure)?;
    let found = metrics.is_some();
    let status = if found { "VOTER_METRICS_FOUND" } else { "VOTER_METRICS_NOT_FOUND" };
    Ok(Json(json!({
        "success": true,
        "status": status,
        "found": found,
        "metrics": metrics,
    })))
}

pub async fn voter_updated_on(
    State(state): State<AppState>,
    Path(voter_we_vote_id): Path<String>,
    Query(query): Query<DayQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let day = require_day(query.date_as_integer, "date_as_integer")?;
    let updated = state
        .db
        .voter_metrics_updated_on(&voter_we_vote_id, day)
        .map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "VOTER_METRICS_UPDATE_CHECKED",
        "updated": updated,
    })))
}

pub async fn dates_with_actions(
    State(state): State<AppState>,
    Query(query): Query<DayRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let from = require_day(query.from, "from")?;
    let through = query.through.map(valid_day).transpose()?;
    let dates = state.db.dates_with_actions(from, through).map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "DATES_WITH_ACTIONS_RETRIEVED",
        "date_as_integer_list": dates,
    })))
}

pub async fn organizations_with_election_activity(
    State(state): State<AppState>,
    Path(google_civic_election_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let organizations = state
        .db
        .organizations_with_election_activity(google_civic_election_id)
        .map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "ORGANIZATIONS_WITH_ELECTION_ACTIVITY_RETRIEVED",
        "organization_we_vote_id_list": organizations,
    })))
}

pub async fn voters_with_changes(
    State(state): State<AppState>,
    Query(query): Query<DayRangeQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let from = require_day(query.from, "from")?;
    let through = require_day(query.through, "through")?;
    let voters = state.db.voters_with_changes(from, through).map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "VOTERS_WITH_CHANGES_RETRIEVED",
        "voter_we_vote_id_list": voters,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{body_json, state};
    use crate::models::metrics::{SitewideDailyMetrics, SitewideVoterMetrics};

    #[tokio::test]
    async fn test_sitewide_daily_range() {
        let state = state();
        for day in [20240101, 20240102, 20240103] {
            state
                .db
                .upsert_sitewide_daily_metrics(&SitewideDailyMetrics {
                    date_as_integer: day,
                    visitors_today: 5,
                    ..Default::default()
                })
                .unwrap();
        }
        let query = DayRangeQuery {
            from: Some(20240102),
            through: None,
        };
        let (_, body) = body_json(sitewide_daily(State(state), Query(query)).await).await;
        let metrics = body["metrics"].as_array().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0]["date_as_integer"], 20240102);
    }

    #[tokio::test]
    async fn test_voter_lookup_and_update_check() {
        let state = state();
        state
            .db
            .upsert_sitewide_voter_metrics(&SitewideVoterMetrics {
                voter_we_vote_id: "wv01a".into(),
                actions_count: 3,
                last_calculated_date_as_integer: 20240105,
                ..Default::default()
            })
            .unwrap();

        let (_, body) = body_json(voter(State(state.clone()), Path("wv01a".into())).await).await;
        assert_eq!(body["found"], true);
        assert_eq!(body["metrics"]["actions_count"], 3);

        let query = DayQuery {
            date_as_integer: Some(20240105),
        };
        let (_, body) = body_json(voter_updated_on(State(state), Path("wv01a".into()), Query(query)).await).await;
        assert_eq!(body["updated"], true);
    }

    #[tokio::test]
    async fn test_voters_with_changes_needs_both_ends() {
        let query = DayRangeQuery {
            from: Some(20240101),
            through: None,
        };
        let (code, body) = body_json(voters_with_changes(State(state()), Query(query)).await).await;
        assert_eq!(code, 400);
        assert!(body["status"].as_str().unwrap().starts_with("MISSING_THROUGH"));
    }
}
