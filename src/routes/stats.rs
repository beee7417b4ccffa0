use crate::{error::Result, AppState};
use axum::{extract::State, response::IntoResponse, Json};

/// Full aggregation response: the five global dimensions plus one block
/// per configured office location. Recomputed from raw rows on every
/// call; any query failure fails the request as a whole.
pub async fn get_stats(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.stats_service.collect().await?;
    Ok(Json(stats))
}
