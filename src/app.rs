use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Json, Router,
};
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{rate_limit::rate_limit, security::security_headers};
use crate::state::AppState;
use crate::{auth, users};

pub fn build_app(state: AppState) -> Router {
    // /api/auth carries the strict auth window on top of the general API one.
    let api = Router::new()
        .nest(
            "/auth",
            auth::router().layer(from_fn_with_state(state.auth_limiter.clone(), rate_limit)),
        )
        .nest("/user", users::router())
        .route("/status", get(api_status))
        .fallback(api_not_found)
        .layer(from_fn_with_state(state.api_limiter.clone(), rate_limit));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(from_fn(security_headers))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "OK",
        "timestamp": now_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}

async fn api_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "message": "API is running",
        "environment": state.config.environment,
        "timestamp": now_rfc3339(),
    }))
}

async fn api_not_found(OriginalUri(uri): OriginalUri) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "API endpoint not found",
            "path": uri.path(),
        })),
    )
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "OK");
        assert!(body["uptime"].is_u64());
    }

    #[tokio::test]
    async fn api_status_reports_environment() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "API is running");
        assert_eq!(body["environment"], "test");
    }

    #[tokio::test]
    async fn unknown_api_path_is_a_json_404() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(Request::get("/api/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["error"], "API endpoint not found");
        assert_eq!(body["path"], "/api/nope");
    }

    #[tokio::test]
    async fn every_response_carries_security_headers() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let headers = response.headers();
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
    }

    #[tokio::test]
    async fn protected_routes_reject_missing_token() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(
                Request::get("/api/user/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "No token provided");
    }

    #[tokio::test]
    async fn protected_routes_reject_bad_token_as_forbidden() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(
                Request::get("/api/user/profile")
                    .header("authorization", "Bearer not.a.jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn auth_limiter_kicks_in_after_five_attempts() {
        let app = build_app(AppState::fake());

        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(
                    Request::post("/api/auth/logout")
                        .header("x-forwarded-for", "198.51.100.7")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(
                Request::post("/api/auth/logout")
                    .header("x-forwarded-for", "198.51.100.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));

        let body = body_json(response).await;
        assert_eq!(
            body["error"],
            "Too many authentication attempts, please try again later"
        );
        assert!(body["retryAfter"].is_u64());
    }

    #[tokio::test]
    async fn logout_answers_without_auth() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(Request::post("/api/auth/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["message"], "Logged out successfully");
    }

    #[tokio::test]
    async fn login_with_missing_fields_is_a_validation_400() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(
                Request::post("/api/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(
            body["details"],
            serde_json::json!(["Email is required", "Password is required"])
        );
    }

    #[tokio::test]
    async fn register_with_empty_body_is_a_validation_400() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(
                Request::post("/api/auth/register")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Validation failed");
        assert!(!body["details"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn register_validation_collects_details() {
        let app = build_app(AppState::fake());
        let response = app
            .oneshot(
                Request::post("/api/auth/register")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"username":"x!","email":"nope","password":"123"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Validation failed");
        let details = body["details"].as_array().unwrap();
        assert_eq!(details.len(), 4);
    }
}
