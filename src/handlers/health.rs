use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

pub async fn healthz(State(state): State<AppState>) -> Json<Value> {
    match state.db.last_processed_day() {
        Ok(last_processed_day) => Json(json!({
            "success": true,
            "status": "ok",
            "last_processed_day": last_processed_day,
        })),
        Err(e) => Json(json!({ "success": false, "status": e.status() })),
    }
}
