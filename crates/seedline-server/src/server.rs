use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    http::{HeaderValue, header},
    middleware,
    routing::{get, post},
};
use seedline_core::{Catalog, MigrationService};
use tower_http::{
    compression::CompressionLayer,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::middleware::{self as app_middleware, Authorizer};
use crate::storage::{self, StorageHandles};
use crate::{handlers, migrations, routes};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: MigrationService,
    pub authorizer: Arc<Authorizer>,
}

impl AppState {
    pub fn new(cfg: &AppConfig, catalog: Catalog, storage: &StorageHandles) -> Self {
        let service = MigrationService::new(
            catalog,
            storage.state_store(cfg.storage.adapter),
            storage.data.clone(),
            storage.kv.clone(),
        );
        Self {
            service,
            authorizer: Arc::new(Authorizer::from_config(&cfg.auth)),
        }
    }
}

/// Connects the configured storage and builds the router with the built-in catalog.
pub async fn build_app(cfg: &AppConfig) -> anyhow::Result<Router> {
    let storage = storage::connect(&cfg.storage).await?;
    let state = AppState::new(cfg, migrations::catalog()?, &storage);
    tracing::info!(
        backend = ?cfg.storage.backend,
        adapter = state.service.adapter_name(),
        migrations = state.service.catalog().len(),
        latest_id = state.service.catalog().latest_id(),
        "Migration service ready"
    );
    Ok(build_router(state, cfg.server.body_limit_bytes))
}

/// Fixed CORS headers on every response. OPTIONS requests still reach
/// the route handlers, which answer `200 {}`.
fn cors_headers() -> (
    SetResponseHeaderLayer<HeaderValue>,
    SetResponseHeaderLayer<HeaderValue>,
    SetResponseHeaderLayer<HeaderValue>,
) {
    (
        SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ),
        SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type,Authorization"),
        ),
        SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET,POST,OPTIONS"),
        ),
    )
}

pub fn build_router(state: AppState, body_limit: usize) -> Router {
    let (allow_origin, allow_headers, allow_methods) = cors_headers();
    let protected = Router::new()
        .route(
            "/run-migrations",
            post(routes::migrations::run_migrations).options(handlers::preflight),
        )
        .route(
            "/migrations-state",
            get(routes::migrations::migrations_state).options(handlers::preflight),
        )
        .route_layer(middleware::from_fn_with_state(
            state.authorizer.clone(),
            app_middleware::require_group,
        ));

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .merge(protected)
        .with_state(state)
        // Middleware stack (order: request id -> cors headers/compression/trace -> body limit)
        .layer(middleware::from_fn(app_middleware::request_id))
        .layer(allow_origin)
        .layer(allow_headers)
        .layer(allow_methods)
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
}

pub struct SeedlineServer {
    addr: SocketAddr,
    app: Router,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<SeedlineServer> {
        let app = build_app(&self.config).await?;
        Ok(SeedlineServer {
            addr: self.addr,
            app,
        })
    }
}

impl SeedlineServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenConfig;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> Router {
        let mut cfg = AppConfig::default();
        cfg.auth.tokens.push(TokenConfig {
            token: "admin-token".into(),
            subject: "ops".into(),
            groups: vec!["admin".into()],
        });
        let catalog = migrations::catalog().unwrap();
        let state = AppState::new(&cfg, catalog, &StorageHandles::in_memory());
        build_router(state, cfg.server.body_limit_bytes)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public_and_tagged() {
        let response = router()
            .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_run_requires_token() {
        let response = router()
            .oneshot(
                Request::post("/run-migrations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_plain_options_returns_empty_object() {
        let response = router()
            .oneshot(
                Request::options("/run-migrations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert_eq!(
            response.headers()["access-control-allow-headers"],
            "Content-Type,Authorization"
        );
        assert_eq!(json_body(response).await, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_request_id_is_preserved() {
        let response = router()
            .oneshot(
                Request::get("/")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }
}
