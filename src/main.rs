mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE}, HeaderValue, Method};
use config::Config;
use crate::db::db::DBClient;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use mail::sendmail::Mailer;
use service::{
    notification_service::NotificationService,
    realtime::TicketEvents,
    storage::AttachmentStorage,
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    pub events: TicketEvents,
    pub notifier: NotificationService,
    pub storage: AttachmentStorage,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        let db_client = Arc::new(db_client);
        let notifier = NotificationService::new(db_client.clone(), Mailer::new(&config));
        let storage = AttachmentStorage::new(&config);

        Self {
            env: config,
            db_client,
            events: TicketEvents::default(),
            notifier,
            storage,
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            tracing::info!("Connection to the database is successful");
            pool
        }
        Err(err) => {
            tracing::error!("Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("Failed to run migrations: {}", err);
        std::process::exit(1);
    }

    let db_client = match config.redis_url {
        Some(ref redis_url) => DBClient::with_redis(pool, redis_url).await,
        None => {
            tracing::info!("Redis not configured, running without profile cache (set REDIS_URL to enable)");
            DBClient::new(pool)
        }
    };

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::PATCH]);

    let app_state = Arc::new(AppState::new(db_client, config.clone()));

    let app = create_router(app_state.clone()).layer(cors);

    tracing::info!("Server is running on http://localhost:{}", config.port);
    tracing::info!("Cache status: {}", app_state.db_client.cache_status());

    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind port {}: {}", config.port, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", err);
    }
}

/// State backed by a lazy pool that never connects; enough for routes that
/// fail before touching the database.
#[cfg(test)]
pub(crate) fn test_state() -> Arc<AppState> {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/helpdesk_test")
        .expect("lazy pool");
    test_state_with(DBClient::new(pool))
}

#[cfg(test)]
pub(crate) fn test_state_with(db_client: DBClient) -> Arc<AppState> {
    let config = Config {
        database_url: "postgres://localhost/helpdesk_test".to_string(),
        redis_url: None,
        app_url: "http://localhost:3000".to_string(),
        jwt_secret: "test-secret".to_string(),
        jwt_maxage: 60,
        port: 0,
        allowed_origins: vec![],
        email_api_url: "http://127.0.0.1:9/email".to_string(),
        email_api_key: None,
        email_sender: "Help Desk <noreply@example.com>".to_string(),
        storage_api_url: None,
        storage_api_token: None,
        storage_public_url: None,
        rooms: service::schedules::Room::defaults(),
    };
    Arc::new(AppState::new(db_client, config))
}
