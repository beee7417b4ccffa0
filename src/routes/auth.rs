use crate::{
    dto::auth_dto::{ChangePasswordPayload, LoginPayload},
    error::{Error, Result},
    models::user::User,
    utils::{crypto, session},
    AppState,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde_json::json;
use validator::Validate;

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let config = crate::config::get_config();

    let user = state
        .user_service
        .find_by_username(payload.username.trim())
        .await?
        .ok_or_else(|| Error::Unauthorized("Invalid username or password".to_string()))?;

    let ok = crypto::verify_password(&payload.password, &user.password_hash)
        .map_err(|e| Error::Internal(format!("Password verification failed: {}", e)))?;
    if !ok {
        return Err(Error::Unauthorized(
            "Invalid username or password".to_string(),
        ));
    }

    let token = session::issue_token(user.id, &config.session_secret, config.session_ttl_minutes)?;
    let cookie = session::session_cookie(
        &token,
        config.session_ttl_minutes,
        config.secure_cookies,
    );

    tracing::info!(username = %user.username, "login");
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({
            "message": "Login successful",
            "user": {
                "id": user.id,
                "username": user.username,
                "isAdmin": user.is_admin,
            },
        })),
    ))
}

pub async fn logout() -> Result<impl IntoResponse> {
    let config = crate::config::get_config();
    let cookie = session::clear_session_cookie(config.secure_cookies);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Logged out" })),
    ))
}

pub async fn current_user(Extension(user): Extension<User>) -> Result<impl IntoResponse> {
    Ok(Json(json!({
        "id": user.id,
        "username": user.username,
        "isAdmin": user.is_admin,
    })))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<ChangePasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;

    let ok = crypto::verify_password(&payload.current_password, &user.password_hash)
        .map_err(|e| Error::Internal(format!("Password verification failed: {}", e)))?;
    if !ok {
        return Err(Error::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let hash = crypto::hash_password(&payload.new_password)
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))?;
    state.user_service.set_password(user.id, &hash).await?;

    Ok(Json(json!({ "message": "Password changed" })))
}
