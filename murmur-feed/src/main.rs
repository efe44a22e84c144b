use std::sync::Arc;

use murmur_feed::config::AppConfig;
use murmur_feed::view_cache::ViewCache;
use murmur_feed::webhook::WebhookVerifier;
use murmur_feed::AppState;
use murmur_shared::clients::db::create_pool;
use murmur_shared::clients::rabbitmq::RabbitMQClient;
use murmur_shared::clients::redis::RedisClient;
use murmur_shared::clients::storage::ObjectStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    murmur_shared::middleware::init_tracing("murmur-feed");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = create_pool(&config.database_url, config.database_pool_size)?;
    let rabbitmq = RabbitMQClient::connect(&config.rabbitmq_url).await?;
    let redis = RedisClient::connect(&config.redis_url).await?;
    let view_cache = ViewCache::new(redis.clone(), config.view_cache_ttl_secs);
    let storage = ObjectStorage::new(
        &config.storage_endpoint,
        &config.storage_access_key,
        &config.storage_secret_key,
        &config.storage_bucket,
        &config.storage_public_url,
    )
    .await;
    let webhook = WebhookVerifier::from_secret(&config.webhook_secret)?;
    let metrics_handle = murmur_shared::middleware::init_metrics()?;

    let state = Arc::new(AppState {
        db,
        config,
        rabbitmq,
        redis,
        view_cache,
        storage,
        webhook,
        metrics_handle,
    });

    let app = murmur_feed::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "murmur-feed starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
