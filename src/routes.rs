// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{assessments, attempts, auth, batches, health, orgs},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Public: health probes and the auth endpoints.
/// * Everything under `/api/orgs` requires a bearer access token.
/// * Applies global middleware (Trace, CORS) and injects `AppState`.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout));

    let org_routes = Router::new()
        .route("/api/orgs", post(orgs::create_org))
        .route("/api/orgs/{org_id}/members", post(orgs::add_member))
        .route("/api/orgs/{org_id}/me", get(orgs::me_in_org))
        .route(
            "/api/orgs/{org_id}/batches",
            get(batches::list_batches).post(batches::create_batch),
        )
        .route(
            "/api/orgs/{org_id}/batches/{batch_id}/members",
            post(batches::add_batch_member),
        )
        .route(
            "/api/orgs/{org_id}/tests",
            get(assessments::list_tests).post(assessments::create_test),
        )
        .route(
            "/api/orgs/{org_id}/tests/{test_id}/questions",
            get(assessments::list_questions).post(assessments::add_question),
        )
        .route(
            "/api/orgs/{org_id}/tests/{test_id}/attempts/start",
            post(attempts::start_attempt),
        )
        .route(
            "/api/orgs/{org_id}/attempts/{attempt_id}/answers/{question_id}",
            put(attempts::upsert_answer),
        )
        .route(
            "/api/orgs/{org_id}/attempts/{attempt_id}/submit",
            post(attempts::submit_attempt),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/db", get(health::health_db))
        .nest("/api/auth", auth_routes)
        .merge(org_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
