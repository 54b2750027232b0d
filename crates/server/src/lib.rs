//! Prethesis API server
//!
//! Routes, shared state and middleware for the thesis, user and program
//! endpoints. The binary in `main.rs` wires configuration, logging and the
//! database together and serves [`create_router`].

pub mod handlers;
pub mod middleware;
pub mod services;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Request},
    http::StatusCode,
    middleware::{from_fn, Next},
    routing::{get, put},
    Router,
};
use prethesis_common::{attachments::FileStore, config::AppConfig, db::DbPool};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::middleware::rate_limit::{create_rate_limiter, rate_limit_middleware};
use crate::services::ThesisService;

/// Application state shared across handlers
#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub files: Arc<dyn FileStore>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, db: DbPool, files: Arc<dyn FileStore>) -> Self {
        Self { config, db, files }
    }

    pub fn theses(&self) -> ThesisService {
        ThesisService::new(self.db.clone(), self.files.clone())
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Theses
        .route(
            "/theses",
            get(handlers::theses::list_theses).post(handlers::theses::create_thesis),
        )
        .route(
            "/theses/{id}",
            get(handlers::theses::get_thesis)
                .put(handlers::theses::update_thesis)
                .delete(handlers::theses::delete_thesis),
        )
        // Current user
        .route(
            "/users",
            get(handlers::users::get_user).put(handlers::users::update_user),
        )
        .route("/users/theses", get(handlers::users::list_supervised_theses))
        .route(
            "/users/favoritePrograms",
            put(handlers::users::update_favorite_programs),
        )
        .route(
            "/users/thesesTableFilters",
            put(handlers::users::update_theses_table_filters),
        )
        // Programs
        .route("/programs", get(handlers::programs::list_programs))
        // Attachments
        .route(
            "/attachments/{filename}",
            get(handlers::attachments::get_attachment),
        )
        .route_layer(from_fn(middleware::metrics::track_requests))
        .layer(DefaultBodyLimit::max(config.storage.max_upload_bytes));

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes);

    let app = if config.rate_limit.enabled {
        let limiter = create_rate_limiter(&config.rate_limit);
        let limit = config.rate_limit.requests_per_second;
        app.layer(from_fn(move |request: Request, next: Next| {
            rate_limit_middleware(request, next, limiter.clone(), limit)
        }))
    } else {
        app
    };

    app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        config.request_timeout(),
    ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}
