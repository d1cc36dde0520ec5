//! HTTP server for the metrics endpoint.

use std::net::SocketAddr;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::SharedCache;

/// Content type of the exposition document.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    cache: SharedCache,
}

/// Create the HTTP router.
///
/// Only `GET` on the two known routes is served; everything else is a bare 404.
pub fn create_router(cache: SharedCache, metrics_path: &str) -> Router {
    let state = AppState { cache };

    Router::new()
        .route(
            metrics_path,
            get(metrics_handler).head(not_found).fallback(not_found),
        )
        .route(
            "/health",
            get(health_handler).head(not_found).fallback(not_found),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    let document = state.cache.current().await;

    (
        StatusCode::OK,
        [(CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        document.body.clone(),
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, [(CONTENT_TYPE, "text/plain")], "OK\n").into_response()
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// HTTP server configuration.
pub struct HttpServer {
    cache: SharedCache,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(cache: SharedCache, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            cache,
            listen_addr,
            metrics_path,
        }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let router = create_router(self.cache, &self.metrics_path);
        let addr = listener.local_addr()?;

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MetricCache;
    use crate::collector::{DeviceDirectory, DeviceSource, MetricCollector};
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request};
    use fakegpu_profiles::{ProfileAssignment, ProfileEngine};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn make_cache() -> SharedCache {
        let cache = Arc::new(MetricCache::new());
        let engine = ProfileEngine::new(&ProfileAssignment::default(), 1..=2, Some(11));
        let mut collector = MetricCollector::new(
            DeviceSource::Synthetic(engine),
            DeviceDirectory::new(1, 2),
            "http-host".to_string(),
        );
        cache.refresh(&mut collector).await;
        cache
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let cache = make_cache().await;
        let expected = cache.current().await.body.clone();
        let router = create_router(cache, "/metrics");

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(CONTENT_TYPE).unwrap();
        assert_eq!(content_type.to_str().unwrap(), METRICS_CONTENT_TYPE);
        assert_eq!(body_string(response).await, expected);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let router = create_router(make_cache().await, "/metrics");

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK\n");
    }

    #[tokio::test]
    async fn test_unknown_path_is_empty_404() {
        let router = create_router(make_cache().await, "/metrics");

        let response = router
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_other_methods_are_404() {
        let router = create_router(make_cache().await, "/metrics");

        let cases = [
            (Method::POST, "/metrics"),
            (Method::DELETE, "/health"),
            (Method::HEAD, "/metrics"),
            (Method::HEAD, "/health"),
            (Method::OPTIONS, "/metrics"),
        ];
        for (method, path) in cases {
            let response = router
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method)
                        .uri(path)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert!(body_string(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_custom_metrics_path() {
        let router = create_router(make_cache().await, "/gpu/metrics");

        let response = router
            .clone()
            .oneshot(Request::get("/gpu/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_requests_do_not_refresh() {
        let cache = make_cache().await;
        let router = create_router(cache.clone(), "/metrics");

        for _ in 0..3 {
            router
                .clone()
                .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
                .await
                .unwrap();
        }
        assert_eq!(cache.stats().refreshes, 1);
    }
}
