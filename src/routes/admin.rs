use crate::{
    dto::admin_dto::{CreateUserPayload, UpdateUserPayload},
    error::{Error, Result},
    models::user::User,
    services::csv_service,
    utils::crypto,
    AppState,
};
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let users = state.user_service.list_with_visit_counts().await?;
    Ok(Json(users))
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let hash = crypto::hash_password(&payload.password)
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))?;
    let user = state
        .user_service
        .create(payload.username.trim(), &hash, payload.is_admin)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(current): Extension<User>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    // An admin may not revoke their own role.
    if id == current.id && payload.is_admin == Some(false) {
        return Err(Error::BadRequest(
            "You cannot remove your own admin role".to_string(),
        ));
    }

    let password_hash = match &payload.password {
        Some(password) => Some(
            crypto::hash_password(password)
                .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))?,
        ),
        None => None,
    };

    let user = state
        .user_service
        .update(
            id,
            payload.username.as_deref(),
            password_hash.as_deref(),
            payload.is_admin,
        )
        .await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<User>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    if id == current.id {
        return Err(Error::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }
    state.user_service.delete(id).await?;
    Ok(Json(json!({ "message": "User deleted" })))
}

pub async fn upload_csv(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut data: Option<Vec<u8>> = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("file") {
            data = Some(field.bytes().await?.to_vec());
        }
    }
    let data = data.ok_or_else(|| Error::BadRequest("No file field in upload".to_string()))?;
    if data.is_empty() {
        return Err(Error::BadRequest("Uploaded file is empty".to_string()));
    }

    let report = state.csv_service.import(&data, user.id).await?;
    tracing::info!(
        total = report.total_processed,
        ok = report.success_count,
        failed = report.failed_count,
        "CSV import finished"
    );
    Ok(Json(report))
}

pub async fn csv_template() -> Result<impl IntoResponse> {
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"besucher_vorlage.csv\"",
            ),
        ],
        csv_service::template(),
    ))
}

pub async fn clear_database(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let deleted = state.visit_service.clear_all().await?;
    tracing::warn!(deleted, "all visits deleted by admin");
    Ok(Json(json!({
        "message": "All visits deleted",
        "deleted": deleted,
    })))
}
