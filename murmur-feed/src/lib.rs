pub mod config;
pub mod events;
pub mod format;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod session;
pub mod view_cache;
pub mod views;
pub mod webhook;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use murmur_shared::clients::db::DbPool;
use murmur_shared::clients::rabbitmq::RabbitMQClient;
use murmur_shared::clients::redis::RedisClient;
use murmur_shared::clients::storage::{ObjectStorage, MAX_IMAGE_BYTES};
use murmur_shared::middleware::metrics_middleware;
use murmur_shared::types::JwtSecretSource;

use crate::config::AppConfig;
use crate::view_cache::ViewCache;
use crate::webhook::WebhookVerifier;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    pub rabbitmq: RabbitMQClient,
    pub redis: RedisClient,
    pub view_cache: ViewCache,
    pub storage: ObjectStorage,
    pub webhook: WebhookVerifier,
    pub metrics_handle: PrometheusHandle,
}

impl JwtSecretSource for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    // Two images plus the text fields.
    let profile_body_limit = 2 * MAX_IMAGE_BYTES + 64 * 1024;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::list([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
        ]))
        .allow_credentials(true);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/timeline", get(routes::posts::timeline))
        .route("/posts", post(routes::posts::create_post))
        .route("/posts/:id", get(routes::posts::post_detail))
        .route("/posts/:id/replies", post(routes::posts::create_reply))
        .route("/posts/:id/quotes", post(routes::posts::create_quote))
        .route("/posts/:id/like", post(routes::likes::toggle_like))
        .route("/profile", get(routes::profile::own_profile))
        .route("/users/:username", get(routes::profile::profile_page))
        .route("/users/:username/posts", get(routes::profile::user_posts))
        .route("/users/:username/edit", get(routes::profile::edit_profile_view))
        .route("/follows/:id", post(routes::follows::toggle_follow))
        .route(
            "/me/profile",
            patch(routes::profile::update_profile).layer(DefaultBodyLimit::max(profile_body_limit)),
        )
        .route("/webhooks/identity", post(routes::webhooks::identity_webhook))
        .layer(axum::middleware::from_fn(metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
