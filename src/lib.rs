pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    csv_service::CsvService, stats_service::StatsService, user_service::UserService,
    visit_service::VisitService,
};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
    Router,
};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub user_service: UserService,
    pub visit_service: VisitService,
    pub stats_service: StatsService,
    pub csv_service: CsvService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let user_service = UserService::new(pool.clone());
        let visit_service = VisitService::new(pool.clone());
        let stats_service = StatsService::new(pool.clone());
        let csv_service = CsvService::new(pool.clone());

        Self {
            pool,
            user_service,
            visit_service,
            stats_service,
            csv_service,
        }
    }
}

/// The full API surface, layered by auth tier: public, session, admin.
/// CSV uploads cap the request body at 10 MiB.
pub fn api_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/login", post(routes::auth::login));

    let session_api = Router::new()
        .route("/api/logout", post(routes::auth::logout))
        .route("/api/user", get(routes::auth::current_user))
        .route(
            "/api/user/change-password",
            post(routes::auth::change_password),
        )
        .route(
            "/api/visits",
            get(routes::visits::list_visits).post(routes::visits::create_visit),
        )
        .route("/api/visits/today", get(routes::visits::today_count))
        .route("/api/stats", get(routes::stats::get_stats))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_session,
        ));

    let admin_api = Router::new()
        .route(
            "/api/admin/users",
            get(routes::admin::list_users).post(routes::admin::create_user),
        )
        .route(
            "/api/admin/users/:id",
            patch(routes::admin::update_user).delete(routes::admin::delete_user),
        )
        .route("/api/admin/upload-csv", post(routes::admin::upload_csv))
        .route("/api/admin/csv-template", get(routes::admin::csv_template))
        .route(
            "/api/admin/clear-database",
            post(routes::admin::clear_database),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ));

    public
        .merge(session_api)
        .merge(admin_api)
        .with_state(state)
        .layer(middleware::cors::permissive_cors())
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
}
