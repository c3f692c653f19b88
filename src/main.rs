mod config;
mod core;
mod models;
mod routes;
mod services;

use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use crate::config::Settings;
use crate::core::{EngineConfig, MatchEngine};
use crate::routes::matchmaking::AppState;
use crate::services::{HistoryClient, ProfileApiClient, ProfileCache, RedisStore, SocketGateway};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .content_type("application/json")
            .body(serde_json::to_string(self).unwrap())
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Initialize logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting Spark Match engine...");

    // Load configuration
    let settings = Settings::load().unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Connect to the shared state store; the engine cannot run without it
    let store: Arc<dyn crate::services::StateStore> = match RedisStore::new(&settings.store.redis_url).await {
        Ok(s) => {
            info!("Shared store connected");
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to connect to Redis ({}), cannot coordinate instances", e);
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "Redis connection required"));
        }
    };

    // Profile repository + read-through cache
    let repository = Arc::new(ProfileApiClient::new(
        settings.profile_api.endpoint,
        settings.profile_api.api_key,
        settings.profile_api.project_id,
    ));
    let profiles = ProfileCache::new(
        repository,
        store.clone(),
        settings.cache.l1_cache_size,
        Duration::from_secs(settings.cache.ttl_secs),
    );
    info!(
        "Profile cache initialized (L1: {} entries, TTL: {}s)",
        settings.cache.l1_cache_size, settings.cache.ttl_secs
    );

    // Notification gateway
    let notifier = Arc::new(SocketGateway::new(
        settings.gateway.endpoint,
        settings.gateway.api_key,
    ));

    // Match history persistence
    let history = Arc::new(
        HistoryClient::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
        )
        .await
        .unwrap_or_else(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            panic!("PostgreSQL connection error: {}", e);
        }),
    );
    info!("History store initialized");

    // Assemble the engine
    let matching = &settings.matching;
    let engine_config = EngineConfig {
        proposal_ttl: Duration::from_secs(matching.proposal_ttl_secs),
        cooldown: Duration::from_secs(matching.cooldown_secs),
        queue_entry_ttl: Duration::from_secs(matching.queue_entry_ttl_secs),
        match_record_ttl: Duration::from_secs(matching.match_record_ttl_secs),
        rate_limit_max: matching.rate_limit_max,
        rate_limit_window: Duration::from_secs(matching.rate_limit_window_secs),
        candidate_batch: matching.candidate_batch,
        heartbeat_scan_limit: matching.heartbeat_scan_limit,
    };

    let engine = Arc::new(MatchEngine::new(
        store,
        profiles,
        notifier,
        history,
        engine_config,
    ));

    info!("Match engine initialized");

    // Background reconciliation loop
    let heartbeat_engine = engine.clone();
    let heartbeat_interval = Duration::from_secs(matching.heartbeat_interval_secs);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(heartbeat_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            heartbeat_engine.heartbeat().await;
        }
    });
    info!("Heartbeat loop started (every {}s)", matching.heartbeat_interval_secs);

    // Build application state
    let app_state = AppState { engine };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
