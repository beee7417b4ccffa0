use crate::{
    dto::visit_dto::{CreateVisitPayload, TodayQuery},
    error::Result,
    models::user::User,
    AppState,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use validator::Validate;

pub async fn create_visit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateVisitPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let visit = state
        .visit_service
        .create(
            payload.category.trim(),
            payload.subcategory.trim(),
            payload.office_location.trim(),
            user.id,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(visit)))
}

pub async fn list_visits(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let visits = state.visit_service.list().await?;
    Ok(Json(visits))
}

pub async fn today_count(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<TodayQuery>,
) -> Result<impl IntoResponse> {
    let count = state
        .visit_service
        .today_count(user.id, query.location.as_deref())
        .await?;
    Ok(Json(json!({ "count": count })))
}
