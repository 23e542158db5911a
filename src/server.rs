use crate::api::{analytics, crm};
use crate::config::Config;
use crate::ingest::handler::ingest_event;
use crate::storage::Database;
use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Maximum accepted event body.
const INGEST_BODY_LIMIT: usize = 65_536;

/// State shared by every handler. The store handle is the only thing
/// requests have in common.
pub struct AppState {
    pub db: Database,
    pub default_project: String,
    pub allowed_origins: Vec<String>,
    pub dashboard_origin: Option<String>,
}

impl AppState {
    pub fn new(db: Database, config: &Config) -> Self {
        Self {
            db,
            default_project: config.default_project.clone(),
            allowed_origins: config.allowed_origins.clone(),
            dashboard_origin: config.dashboard_origin.clone(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    // Tracking snippet runs on the customer's own site
    let ingestion_cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let dashboard_cors = build_dashboard_cors(state.dashboard_origin.as_deref());

    let ingestion_routes = Router::new()
        .route("/event", post(ingest_event))
        .layer(DefaultBodyLimit::max(INGEST_BODY_LIMIT))
        .layer(ingestion_cors);

    let dashboard_routes = Router::new()
        .route("/overview", get(analytics::get_overview))
        .route("/users", get(analytics::get_users))
        .route("/experiments", post(analytics::post_experiments))
        .route(
            "/projects/{project_id}/experiments/{exp_id}",
            put(crm::put_experiment),
        )
        .route("/leads", get(crm::list_leads).post(crm::create_lead))
        .route(
            "/leads/{id}",
            get(crm::get_lead)
                .patch(crm::patch_lead)
                .delete(crm::delete_lead),
        )
        .route("/sales", get(crm::get_sales))
        .route("/sales/{id}", put(crm::put_sales))
        .layer(dashboard_cors);

    let api_routes = Router::new()
        .merge(ingestion_routes)
        .merge(dashboard_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(axum::middleware::map_response(add_security_headers))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Inject security headers on every HTTP response.
async fn add_security_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    response
}

/// CORS for the dashboard routes. Only `dashboard_origin` is granted
/// cross-origin access; without one the routes are same-origin only.
fn build_dashboard_cors(dashboard_origin: Option<&str>) -> CorsLayer {
    let parsed = dashboard_origin.and_then(|origin| {
        origin
            .parse::<HeaderValue>()
            .inspect_err(|e| tracing::warn!(origin, error = %e, "Ignoring invalid dashboard_origin"))
            .ok()
    });

    parsed.map_or_else(
        // No allowed origin, so no access-control-allow-origin header
        CorsLayer::new,
        |origin| {
            CorsLayer::new()
                .allow_origin([origin])
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::DELETE,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::HeaderName::from_static(crate::api::auth::ACTOR_HEADER),
                ])
                .allow_credentials(true)
        },
    )
}

/// GET /health — Liveness probe.
async fn health_check() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn make_test_state() -> Arc<AppState> {
        let db = Database::open_in_memory().unwrap();
        Arc::new(AppState::new(db, &Config::default()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = build_router(make_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_ingest_event() {
        let app = build_router(make_test_state());
        let payload = serde_json::json!({
            "projectId": "acme",
            "type": "page_view",
            "anonUserId": "u1",
            "url": "https://acme.test/",
        });
        let (status, _) = send(app, post_json("/api/event", &payload)).await;
        assert_eq!(status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_ingest_event_invalid_payload() {
        let app = build_router(make_test_state());
        let (status, body) = send(app, post_json("/api/event", &serde_json::json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Bad request");
    }

    #[tokio::test]
    async fn test_ingest_event_unknown_type() {
        let app = build_router(make_test_state());
        let payload = serde_json::json!({ "projectId": "acme", "type": "hover" });
        let (status, _) = send(app, post_json("/api/event", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ingest_rejects_disallowed_origin() {
        let db = Database::open_in_memory().unwrap();
        let config = Config {
            allowed_origins: vec!["acme.test".to_string()],
            ..Config::default()
        };
        let app = build_router(Arc::new(AppState::new(db, &config)));

        let request = Request::builder()
            .method("POST")
            .uri("/api/event")
            .header("content-type", "application/json")
            .header("origin", "https://evil.test")
            .body(Body::from(
                serde_json::json!({ "projectId": "acme", "type": "pageview" }).to_string(),
            ))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Forbidden");
    }

    #[tokio::test]
    async fn test_overview_empty() {
        let app = build_router(make_test_state());
        let request = Request::builder()
            .uri("/api/overview?projectId=acme&days=3")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["days"], 3);
        assert_eq!(body["totals"]["totalPageViews"], 0);
        assert_eq!(body["charts"]["pageViews"]["labels"].as_array().unwrap().len(), 3);
        assert!(body["charts"]["pageViews"]["deltaPct"].is_null());
    }

    #[tokio::test]
    async fn test_overview_bad_days() {
        let app = build_router(make_test_state());
        let request = Request::builder()
            .uri("/api/overview?days=soon")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, serde_json::json!({ "error": "Bad request" }));
    }

    #[tokio::test]
    async fn test_lead_mutation_requires_actor() {
        let app = build_router(make_test_state());
        let (status, body) = send(
            app,
            post_json("/api/leads", &serde_json::json!({ "companyName": "Acme" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_missing_lead_is_404() {
        let app = build_router(make_test_state());
        let request = Request::builder()
            .uri("/api/leads/nope")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not found");
    }

    #[tokio::test]
    async fn test_not_found() {
        let app = build_router(make_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    fn cross_origin_get(uri: &str, origin: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("origin", origin)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_dashboard_same_origin_without_config() {
        let app = build_router(make_test_state());
        let response = app
            .oneshot(cross_origin_get("/api/overview", "https://evil.example"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_dashboard_preflight_denied_without_config() {
        let app = build_router(make_test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/leads")
                    .header("origin", "https://evil.example")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(!response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_dashboard_invalid_origin_is_same_origin() {
        let db = Database::open_in_memory().unwrap();
        let config = Config {
            dashboard_origin: Some("bad\norigin".to_string()),
            ..Config::default()
        };
        let app = build_router(Arc::new(AppState::new(db, &config)));
        let response = app
            .oneshot(cross_origin_get("/api/overview", "https://evil.example"))
            .await
            .unwrap();
        assert!(!response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_dashboard_configured_origin() {
        let db = Database::open_in_memory().unwrap();
        let config = Config {
            dashboard_origin: Some("https://crm.acme.test".to_string()),
            ..Config::default()
        };
        let app = build_router(Arc::new(AppState::new(db, &config)));

        let response = app
            .clone()
            .oneshot(cross_origin_get("/api/overview", "https://crm.acme.test"))
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "https://crm.acme.test"
        );

        let response = app
            .oneshot(cross_origin_get("/api/overview", "https://evil.example"))
            .await
            .unwrap();
        assert!(!response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let app = build_router(make_test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/event")
                    .header("origin", "https://acme.test")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response
            .headers()
            .contains_key("access-control-allow-origin"));
    }
}
