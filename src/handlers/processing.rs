use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::handlers::{ApiError, failure, valid_day};
use crate::models::processing::{ProcessedFilter, ProcessedQuery};

pub async fn get_processing_status(
    State(state): State<AppState>,
    Path(day): Path<u32>,
) -> Result<impl IntoResponse, ApiError> {
    let day = valid_day(day)?;
    let processing_status = state.db.get_processing_status(day).map_err(failure)?;
    let found = processing_status.is_some();
    let status = if found { "PROCESSING_STATUS_FOUND" } else { "PROCESSING_STATUS_NOT_FOUND" };
    Ok(Json(json!({
        "success": true,
        "status": status,
        "found": found,
        "processing_status": processing_status,
    })))
}

pub async fn list_processed(
    State(state): State<AppState>,
    Query(query): Query<ProcessedQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state.db.list_processed(&query.to_filter()).map_err(failure)?;
    Ok(Json(json!({
        "success": true,
        "status": "PROCESSED_LIST_RETRIEVED",
        "found": !list.markers.is_empty(),
        "markers": list.markers,
        "voter_we_vote_id_list": list.voter_we_vote_id_list,
    })))
}

pub async fn delete_processed(
    State(state): State<AppState>,
    Json(filter): Json<ProcessedFilter>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(day) = filter.analytics_date_as_integer {
        valid_day(day)?;
    }
    let deleted = state.db.delete_processed(&filter).map_err(failure)?;
    tracing::info!("deleted {deleted} processed markers");
    Ok(Json(json!({
        "success": true,
        "status": "PROCESSED_DELETED",
        "deleted": deleted,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{body_json, state};
    use crate::models::processing::{ProcessedMarker, ProcessingStage};

    fn marker(voter: &str) -> ProcessedMarker {
        ProcessedMarker {
            analytics_date_as_integer: 20240105,
            voter_we_vote_id: Some(voter.into()),
            kind_of_process: ProcessingStage::CalculateSitewideVoterMetrics.kind_of_process().into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_status_rejects_bad_day() {
        let (code, body) = body_json(get_processing_status(State(state()), Path(20241340)).await).await;
        assert_eq!(code, 400);
        assert!(body["status"].as_str().unwrap().starts_with("INVALID_DATE_AS_INTEGER"));
    }

    #[tokio::test]
    async fn test_status_not_found_is_success() {
        let (code, body) = body_json(get_processing_status(State(state()), Path(20240105)).await).await;
        assert_eq!(code, 200);
        assert_eq!(body["found"], false);
    }

    #[tokio::test]
    async fn test_list_then_delete_markers() {
        let state = state();
        state.db.save_processed_marker(&marker("wv01a")).unwrap();
        state.db.save_processed_marker(&marker("wv01b")).unwrap();

        let query = ProcessedQuery {
            analytics_date_as_integer: Some(20240105),
            ..Default::default()
        };
        let (_, body) = body_json(list_processed(State(state.clone()), Query(query)).await).await;
        assert_eq!(body["voter_we_vote_id_list"], json!(["wv01a", "wv01b"]));

        let (code, _) = body_json(delete_processed(State(state.clone()), Json(ProcessedFilter::default())).await).await;
        assert_eq!(code, 400);

        let filter = ProcessedFilter {
            analytics_date_as_integer: Some(20240105),
            voter_we_vote_id: Some("wv01a".into()),
            ..Default::default()
        };
        let (_, body) = body_json(delete_processed(State(state), Json(filter)).await).await;
        assert_eq!(body["deleted"], 1);
    }
}
