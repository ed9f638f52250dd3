// tests/router_tests.rs
//
// Router-level checks that never reach the database: the pool is lazy and
// every request here is answered before a connection is needed.

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use zenith_api::{
    config::Config, routes, services::access::RoleRegistry, state::AppState,
    utils::jwt::issue_refresh_token,
};

const SECRET: &str = "router_test_secret";

fn app() -> Router {
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .expect("lazy pool");

    let config = Config {
        database_url: "postgres://localhost/unused".to_string(),
        jwt_secret: SECRET.to_string(),
        jwt_access_minutes: 30,
        jwt_refresh_days: 30,
        rust_log: "error".to_string(),
        port: 0,
        db_max_connections: 1,
    };

    routes::create_router(AppState {
        pool,
        config,
        roles: Arc::new(RoleRegistry::default()),
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn unknown_path_is_404() {
    let response = app()
        .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn org_routes_require_a_token() {
    let org = uuid::Uuid::new_v4();
    let requests = [
        Request::post("/api/orgs")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"name":"Acme"}"#))
            .unwrap(),
        Request::get(format!("/api/orgs/{}/batches", org))
            .body(Body::empty())
            .unwrap(),
        Request::post(format!(
            "/api/orgs/{}/tests/{}/attempts/start",
            org,
            uuid::Uuid::new_v4()
        ))
        .body(Body::empty())
        .unwrap(),
    ];

    for request in requests {
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Not authenticated");
    }
}

#[tokio::test]
async fn garbage_bearer_token_is_401() {
    let response = app()
        .oneshot(
            Request::get(format!("/api/orgs/{}/me", uuid::Uuid::new_v4()))
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Invalid token");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let (refresh, _) = issue_refresh_token(uuid::Uuid::new_v4(), 1, SECRET).unwrap();

    let response = app()
        .oneshot(
            Request::get(format!("/api/orgs/{}/tests", uuid::Uuid::new_v4()))
                .header(header::AUTHORIZATION, format!("Bearer {}", refresh))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_validates_before_touching_the_database() {
    let response = app()
        .oneshot(
            Request::post("/api/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    r#"{"email":"not-an-email","password":"password123"}"#,
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
