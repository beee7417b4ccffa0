use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use visitor_tracking_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    error::{Error, Result},
    utils::crypto,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool);
    bootstrap_admin(&app_state).await?;

    let app = visitor_tracking_backend::api_router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Creates the initial admin account when `BOOTSTRAP_ADMIN_USERNAME` /
/// `BOOTSTRAP_ADMIN_PASSWORD` are set and no such user exists yet.
async fn bootstrap_admin(state: &AppState) -> Result<()> {
    let config = get_config();
    let (Some(username), Some(password)) = (
        config.bootstrap_admin_username.as_deref(),
        config.bootstrap_admin_password.as_deref(),
    ) else {
        return Ok(());
    };

    if state.user_service.find_by_username(username).await?.is_some() {
        return Ok(());
    }

    let hash = crypto::hash_password(password)
        .map_err(|e| Error::Internal(format!("Password hashing failed: {}", e)))?;
    state.user_service.create(username, &hash, true).await?;
    info!(username, "bootstrap admin user created");
    Ok(())
}
