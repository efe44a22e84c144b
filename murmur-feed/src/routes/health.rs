use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use diesel::RunQueryDsl;
use murmur_shared::{HealthCheck, HealthResponse, HealthStatus};
use std::sync::Arc;

use crate::AppState;

/// Probes Postgres, Redis and RabbitMQ. Only a database outage makes the
/// service unhealthy; the cache and the broker degrade it.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let postgres = match state.db.get() {
        Ok(mut conn) => match diesel::sql_query("SELECT 1").execute(&mut conn) {
            Ok(_) => HealthCheck::healthy("postgres"),
            Err(e) => HealthCheck::failed("postgres", HealthStatus::Unhealthy, e.to_string()),
        },
        Err(e) => HealthCheck::failed("postgres", HealthStatus::Unhealthy, e.to_string()),
    };

    let redis = match state.redis.ping().await {
        Ok(()) => HealthCheck::healthy("redis"),
        Err(e) => HealthCheck::failed("redis", HealthStatus::Degraded, e.to_string()),
    };

    let rabbitmq = if state.rabbitmq.is_connected() {
        HealthCheck::healthy("rabbitmq")
    } else {
        HealthCheck::failed("rabbitmq", HealthStatus::Degraded, "channel closed")
    };

    let response = HealthResponse::healthy("murmur-feed", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![postgres, redis, rabbitmq]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
