//! HTTP Middleware Example
//!
//! Serves a router whose `/data` handler always fails, wrapped in the retry
//! middleware. Requests to `/data` end with 503 once retries run out.
//!
//! ```text
//! cargo run --example http_middleware
//! curl -i localhost:8080/data
//! ```

use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{self, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use eddy::middleware::{RetryLayer, RetryService};
use eddy::RetryPolicy;
use tokio_util::sync::CancellationToken;
use tower::{Layer, ServiceExt};

async fn always_fails() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn healthy() -> &'static str {
    "ok\n"
}

/// Buffer the incoming body so the retry middleware can replay the request.
async fn buffered(
    State(app): State<RetryService<Router>>,
    request: Request,
) -> impl IntoResponse {
    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, 1024 * 1024).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => return (StatusCode::PAYLOAD_TOO_LARGE, Body::empty()).into_response(),
    };

    app.oneshot(http::Request::from_parts(parts, body))
        .await
        .into_response()
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt().with_target(false).init();

    let shutdown = CancellationToken::new();
    let policy = RetryPolicy::exponential(Duration::from_millis(100))
        .with_max_retries(4)
        .with_jitter(0.2)
        .with_retryable_status_codes([500, 502, 503, 504]);

    let inner = Router::new()
        .route("/data", get(always_fails))
        .route("/health", get(healthy));
    let app = RetryLayer::new(policy)
        .with_cancellation(shutdown.clone())
        .layer(inner);

    let router = Router::new().fallback(buffered).with_state(app);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
    tracing::info!(address = %listener.local_addr()?, "starting server");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        })
        .await
}
