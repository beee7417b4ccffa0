use crate::models::user::User;
use crate::utils::session;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use uuid::Uuid;

fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}

/// Validates the session token and re-fetches the user row, so role
/// changes and deletions take effect on the next request.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, Response> {
    let Some(token) = session::extract_token(headers) else {
        return Err(unauthorized("not_authenticated"));
    };

    let config = crate::config::get_config();
    let Ok(claims) = session::decode_token(&token, &config.session_secret) else {
        return Err(unauthorized("invalid_session"));
    };
    let Ok(user_id) = Uuid::parse_str(&claims.sub) else {
        return Err(unauthorized("invalid_session"));
    };

    match state.user_service.find_by_id(user_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(unauthorized("unknown_user")),
        Err(e) => {
            tracing::error!(error = ?e, "failed to load session user");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "A database error occurred" })),
            )
                .into_response())
        }
    }
}

pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}

pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match authenticate(&state, req.headers()).await {
        Ok(user) => {
            if !user.is_admin {
                return (StatusCode::FORBIDDEN, Json(json!({ "error": "forbidden" })))
                    .into_response();
            }
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(resp) => resp,
    }
}
