//! The three-route HTTP surface (`spec.md` §4.3 step 5), grounded on
//! `create_router`/`start_server` in `queue-keeper-service/src/lib.rs`
//! (`ServiceBuilder` layering a `TraceLayer`, `axum::serve` over a bound
//! listener, a `ServiceError`-style bind/serve error split) but stripped down
//! to the three routes this daemon actually exposes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chopsticks_aggregator::Aggregator;
use tokio::sync::Notify;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::DaemonError;

/// `spec.md` §4.3: "Shut down the HTTP server (bounded wait — force-close
/// after 5 s)".
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const LANDING_PAGE: &str = "<html>\
<head><title>Chopsticks Metrics</title></head>\
<body><h1>Chopsticks Metrics Exporter</h1>\
<p><a href=\"/metrics\">Metrics endpoint</a></p></body></html>";

#[derive(Clone)]
struct AppState {
    aggregator: Arc<Aggregator>,
}

pub fn router(aggregator: Arc<Aggregator>) -> Router {
    let state = AppState { aggregator };
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/", get(index_handler))
        .fallback(not_found)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Response {
    let body = state.aggregator.render();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn index_handler() -> Html<&'static str> {
    Html(LANDING_PAGE)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

/// Bind and serve the HTTP endpoint, honoring a cooperative shutdown signal
/// so the caller's overall shutdown sequence (`spec.md` §4.3) can bound the
/// wait.
pub async fn serve(
    host: &str,
    port: u16,
    aggregator: Arc<Aggregator>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), DaemonError> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|_| DaemonError::HttpBindFailed {
            address: format!("{host}:{port}"),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid bind address"),
        })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| DaemonError::HttpBindFailed {
            address: addr.to_string(),
            source,
        })?;

    info!(%addr, "metrics http server listening");

    // `with_graceful_shutdown` waits for every in-flight connection to
    // drain once `shutdown` resolves, with no bound of its own. Race it
    // against a grace-period timer that only starts ticking once shutdown
    // actually begins, so a single stalled connection can't hang the daemon
    // forever.
    let shutdown_started = Arc::new(Notify::new());
    let notify_on_shutdown = shutdown_started.clone();
    let graceful_shutdown = async move {
        shutdown.await;
        notify_on_shutdown.notify_one();
    };

    let serve_fut = axum::serve(listener, router(aggregator)).with_graceful_shutdown(graceful_shutdown);

    let force_close_after_grace = async {
        shutdown_started.notified().await;
        tokio::time::sleep(SHUTDOWN_GRACE).await;
    };

    tokio::select! {
        result = serve_fut => result.map_err(DaemonError::HttpServerFailed),
        _ = force_close_after_grace => {
            warn!(
                grace_seconds = SHUTDOWN_GRACE.as_secs(),
                "http server did not drain in-flight connections within the grace period; force-closing"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn metrics_route_returns_prometheus_content_type() {
        let app = router(Arc::new(Aggregator::new()));
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn index_route_links_to_metrics() {
        let app = router(Arc::new(Aggregator::new()));
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let app = router(Arc::new(Aggregator::new()));
        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_returns_promptly_when_shutdown_fires_with_no_open_connections() {
        let aggregator = Arc::new(Aggregator::new());
        let start = tokio::time::Instant::now();
        let result = serve("127.0.0.1", 19293, aggregator, async {}).await;
        let elapsed = start.elapsed();
        assert!(result.is_ok());
        assert!(
            elapsed < SHUTDOWN_GRACE,
            "serve() should return as soon as the in-flight connections drain, not wait out the \
             full grace period when there are none"
        );
    }
}
