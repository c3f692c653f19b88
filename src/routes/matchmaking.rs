use crate::core::{EngineError, MatchEngine};
use crate::models::{
    CancelSearchRequest, CancelSearchResponse, DecideRequest, Decision, ErrorResponse,
    HealthResponse, MetricsResponse, StartSearchRequest, StartSearchResponse, StatusQuery,
    StatusResponse,
};
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchEngine>,
}

/// Configure all matchmaking routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .route("/matchmaking/search/start", web::post().to(start_search))
        .route("/matchmaking/search/cancel", web::post().to(cancel_search))
        .route("/matchmaking/status", web::get().to(get_status))
        .route("/matchmaking/decide", web::post().to(decide))
        .route("/matchmaking/metrics", web::get().to(get_metrics));
}

fn engine_error_response(err: EngineError) -> HttpResponse {
    match err {
        EngineError::RateLimited(user) => HttpResponse::TooManyRequests().json(ErrorResponse {
            error: "rate_limited".to_string(),
            message: format!("Too many search requests for user {}", user),
            status_code: 429,
        }),
        EngineError::ProfileNotFound(user) => HttpResponse::NotFound().json(ErrorResponse {
            error: "profile_not_found".to_string(),
            message: format!("No profile found for user {}", user),
            status_code: 404,
        }),
        EngineError::NoActiveProposal(user) => HttpResponse::NotFound().json(ErrorResponse {
            error: "no_active_proposal".to_string(),
            message: format!("User {} has no active proposal", user),
            status_code: 404,
        }),
        EngineError::Store(e) => {
            tracing::error!("Store failure surfaced to handler: {}", e);
            HttpResponse::ServiceUnavailable().json(ErrorResponse {
                error: "store_unavailable".to_string(),
                message: "Shared store is unavailable, try again shortly".to_string(),
                status_code: 503,
            })
        }
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.engine.store_healthy().await;
    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Start searching for a connection
///
/// POST /api/v1/matchmaking/search/start
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "preferences": { "ageFlexibility": "moderate" }
/// }
/// ```
async fn start_search(
    state: web::Data<AppState>,
    req: web::Json<StartSearchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "validation_failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    tracing::info!("Search requested by user: {}", req.user_id);

    match state
        .engine
        .start_search(&req.user_id, req.preferences.clone())
        .await
    {
        Ok(searching) => HttpResponse::Ok().json(StartSearchResponse { searching }),
        Err(e) => engine_error_response(e),
    }
}

/// Cancel an ongoing search
///
/// POST /api/v1/matchmaking/search/cancel
async fn cancel_search(
    state: web::Data<AppState>,
    req: web::Json<CancelSearchRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "validation_failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    match state.engine.cancel_search(&req.user_id).await {
        Ok(()) => HttpResponse::Ok().json(CancelSearchResponse { cancelled: true }),
        Err(e) => engine_error_response(e),
    }
}

/// Current matchmaking status for a user
///
/// GET /api/v1/matchmaking/status?userId={userId}
async fn get_status(
    state: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> impl Responder {
    if query.user_id.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "missing_user_id".to_string(),
            message: "userId query parameter is required".to_string(),
            status_code: 400,
        });
    }

    let status = state.engine.get_status(&query.user_id).await;
    HttpResponse::Ok().json(StatusResponse::from_status(status, &query.user_id))
}

/// Accept or pass on the caller's active proposal
///
/// POST /api/v1/matchmaking/decide
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "decision": "accept|pass"
/// }
/// ```
async fn decide(state: web::Data<AppState>, req: web::Json<DecideRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "validation_failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    let Some(decision) = Decision::parse(&req.decision) else {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "invalid_decision".to_string(),
            message: "Decision must be one of: accept, pass".to_string(),
            status_code: 400,
        });
    };

    match state.engine.decide(&req.user_id, decision).await {
        Ok(status) => HttpResponse::Ok().json(StatusResponse::from_status(status, &req.user_id)),
        Err(e) => engine_error_response(e),
    }
}

/// Aggregate operational counters
///
/// GET /api/v1/matchmaking/metrics
async fn get_metrics(state: web::Data<AppState>) -> impl Responder {
    let counters = state.engine.metrics_snapshot().await;
    HttpResponse::Ok().json(MetricsResponse { counters })
}
