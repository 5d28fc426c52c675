use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use cbexporter_common::{error::Result, status::CollectorStatus};
use tower_http::trace::TraceLayer;

use crate::{
    handlers,
    metrics::{HttpMetrics, MetricsRegistry},
    middleware::bearer_auth,
};

pub struct ExporterState {
    pub registry: Arc<MetricsRegistry>,
    pub http_metrics: Arc<HttpMetrics>,
    pub status: Arc<CollectorStatus>,
    pub token: Option<String>,
}

impl ExporterState {
    pub fn new(
        registry: Arc<MetricsRegistry>,
        status: Arc<CollectorStatus>,
        token: Option<String>,
    ) -> Result<Self> {
        let http_metrics = Arc::new(HttpMetrics::register(registry.as_ref())?);

        Ok(Self {
            registry,
            http_metrics,
            status,
            token: token.filter(|value| !value.trim().is_empty()),
        })
    }
}

pub fn exporter_router(state: Arc<ExporterState>) -> Router {
    let scrape = Router::new()
        .route("/metrics", get(handlers::metrics::prometheus_metrics))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            bearer_auth,
        ));

    Router::new()
        .route("/health/live", get(handlers::health::health_live))
        .route("/health/ready", get(handlers::health::health_ready))
        .merge(scrape)
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::metrics::track_http_metrics,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use cbexporter_common::status::CollectorStatus;
    use tower::ServiceExt;

    use super::{ExporterState, exporter_router};
    use crate::metrics::MetricsRegistry;

    fn app(token: Option<&str>) -> (Router, Arc<ExporterState>) {
        let registry = Arc::new(MetricsRegistry::new());
        let gauge = registry
            .register_gauge(
                "cbpernodebucket_curr_items",
                "Current items",
                &["bucket", "node", "cluster"],
            )
            .unwrap();
        gauge.set(&["default", "node1", "prod"], 30.0);

        let state = Arc::new(
            ExporterState::new(
                registry,
                Arc::new(CollectorStatus::new()),
                token.map(str::to_string),
            )
            .unwrap(),
        );
        (exporter_router(Arc::clone(&state)), state)
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn serves_metrics_in_text_format() {
        let (router, state) = app(None);

        let response = router.oneshot(get("/metrics", None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(
            "cbpernodebucket_curr_items{bucket=\"default\",node=\"node1\",cluster=\"prod\"} 30"
        ));
        assert_eq!(state.http_metrics.requests("GET", 200), 1);
    }

    #[tokio::test]
    async fn scrape_token_is_enforced() {
        let (router, state) = app(Some("s3cret"));

        let missing = router.clone().oneshot(get("/metrics", None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let wrong = router.clone().oneshot(get("/metrics", Some("nope"))).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        let ok = router.oneshot(get("/metrics", Some("s3cret"))).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        assert_eq!(state.http_metrics.requests("GET", 401), 2);
    }

    #[tokio::test]
    async fn health_endpoints_skip_token() {
        let (router, _) = app(Some("s3cret"));

        let live = router.oneshot(get("/health/live", None)).await.unwrap();
        assert_eq!(live.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ready_follows_collector_status() {
        let (router, state) = app(None);

        let before = router.clone().oneshot(get("/health/ready", None)).await.unwrap();
        assert_eq!(before.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.status.mark_running("node1", "prod");
        state.status.record_cycle();

        let after = router.oneshot(get("/health/ready", None)).await.unwrap();
        assert_eq!(after.status(), StatusCode::OK);
        let body = to_bytes(after.into_body(), usize::MAX).await.unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot["node"], "node1");
        assert_eq!(snapshot["cycles_completed"], 1);
    }
}
