use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::{api, AppState};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health_check))
        .route("/api/health", get(api::health_check))
        .route("/api/predict", post(api::post_predict))
        .route("/api/features-columns", post(api::post_features_columns))
        .route("/api/indicators", post(api::post_indicators))
        .route("/api/indicator", post(api::post_indicator))
        .route("/api/history", post(api::post_history))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Forecast API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
