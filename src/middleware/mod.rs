//! Retry middleware for `tower` HTTP services.
//!
//! # Data Flow
//! ```text
//! Request
//!     → RetryService (clones the request for every attempt)
//!     → inner service
//!     → status >= 500 ? HttpError (retried) : response (returned as-is)
//!     → terminal outcome mapped to 429 / 503 / 500
//! ```
//!
//! # Design Decisions
//! - The request body must be `Clone`; buffer streaming bodies before this layer
//! - Only the response of the successful attempt reaches the caller
//! - Errors from the inner service itself are returned without retrying
//! - Each request gets a child of the layer's cancellation token, so cancelling
//!   the parent (for example at shutdown) ends every pending wait

use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use http::header::{HeaderValue, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::{Request, Response, StatusCode};
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service, ServiceExt};

use crate::retry::{run, HttpError, RetryOutcome, RetryPolicy};

const RETRYABLE_MESSAGE: &str = "Retryable HTTP error";
const CIRCUIT_OPEN_BODY: &str = "Circuit breaker triggered - Too many failures\n";
const EXHAUSTED_BODY: &str = "Service unavailable - Retry limit exceeded\n";
const NOT_RETRYABLE_BODY: &str = "Service unavailable - Non-retryable failure\n";
const UNEXPECTED_BODY: &str = "Unexpected error\n";

/// Wrap `inner` so that server errors are retried under `policy`.
///
/// Shorthand for `RetryLayer::new(policy).layer(inner)`.
///
/// # Examples
///
/// ```rust
/// use eddy::middleware::wrap;
/// use eddy::RetryPolicy;
/// use http::{Request, Response, StatusCode};
/// use std::convert::Infallible;
/// use std::time::Duration;
/// use tower::{service_fn, ServiceExt};
///
/// # tokio_test::block_on(async {
/// let handler = service_fn(|_req: Request<String>| async {
///     let mut response = Response::new(String::new());
///     *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
///     Ok::<_, Infallible>(response)
/// });
///
/// let policy = RetryPolicy::fixed(Duration::from_millis(1))
///     .with_max_retries(3)
///     .with_retryable_status_codes([500]);
///
/// let response = wrap(policy, handler)
///     .oneshot(Request::new(String::new()))
///     .await
///     .unwrap();
///
/// assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
/// # });
/// ```
pub fn wrap<S>(policy: RetryPolicy<HttpError>, inner: S) -> RetryService<S> {
    RetryLayer::new(policy).layer(inner)
}

/// Layer that applies [`RetryService`].
#[derive(Debug, Clone)]
pub struct RetryLayer {
    policy: Arc<RetryPolicy<HttpError>>,
    cancel: CancellationToken,
}

impl RetryLayer {
    /// Create a layer retrying under `policy`.
    pub fn new(policy: RetryPolicy<HttpError>) -> Self {
        Self {
            policy: Arc::new(policy),
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel pending retries of every request when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get the policy shared by every request.
    pub fn policy(&self) -> &RetryPolicy<HttpError> {
        &self.policy
    }
}

impl<S> Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            policy: Arc::clone(&self.policy),
            cancel: self.cancel.clone(),
        }
    }
}

/// Service that re-issues a request while the inner service answers with 5xx.
#[derive(Debug, Clone)]
pub struct RetryService<S> {
    inner: S,
    policy: Arc<RetryPolicy<HttpError>>,
    cancel: CancellationToken,
}

impl<S> RetryService<S> {
    /// Get a reference to the wrapped service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consume the middleware, returning the wrapped service.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RetryService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send + 'static,
    ReqBody: Clone + Send + 'static,
    ResBody: From<&'static str> + Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        // `poll_ready` reserved capacity on `self.inner`; that handle serves the first attempt.
        let clone = self.inner.clone();
        let template = clone.clone();
        let mut readied = Some(std::mem::replace(&mut self.inner, clone));
        let policy = Arc::clone(&self.policy);
        let cancel = self.cancel.child_token();

        Box::pin(async move {
            let attempt = move || {
                let request = clone_request(&request);
                let first = readied.take();
                let is_ready = first.is_some();
                let mut service = first.unwrap_or_else(|| template.clone());
                async move {
                    let result = if is_ready {
                        service.call(request).await
                    } else {
                        service.oneshot(request).await
                    };
                    match result {
                        Ok(response) if response.status().as_u16() >= 500 => {
                            Err(HttpError::new(response.status().as_u16(), RETRYABLE_MESSAGE))
                        }
                        // Transport errors end the run and go back to the caller untouched.
                        other => Ok(other),
                    }
                }
            };

            match run(attempt, &*policy, &cancel).await {
                RetryOutcome::Succeeded { value, .. } => value,
                RetryOutcome::CircuitOpen { .. } => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("circuit breaker triggered for HTTP request");
                    Ok(text_response(StatusCode::TOO_MANY_REQUESTS, CIRCUIT_OPEN_BODY))
                }
                RetryOutcome::ExhaustedRetries(exhausted) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        attempts = exhausted.attempts,
                        status = exhausted.final_error.status,
                        "max retries reached for HTTP request"
                    );
                    #[cfg(not(feature = "tracing"))]
                    let _ = exhausted;
                    Ok(text_response(StatusCode::SERVICE_UNAVAILABLE, EXHAUSTED_BODY))
                }
                RetryOutcome::NotRetryable { error, .. } => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(status = error.status, "non-retryable HTTP failure");
                    #[cfg(not(feature = "tracing"))]
                    let _ = error;
                    Ok(text_response(StatusCode::SERVICE_UNAVAILABLE, NOT_RETRYABLE_BODY))
                }
                RetryOutcome::Cancelled { attempts } => {
                    #[cfg(feature = "tracing")]
                    tracing::error!(attempts, "retry middleware cancelled while waiting");
                    #[cfg(not(feature = "tracing"))]
                    let _ = attempts;
                    Ok(text_response(StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED_BODY))
                }
            }
        })
    }
}

fn clone_request<B: Clone>(request: &Request<B>) -> Request<B> {
    let mut cloned = Request::new(request.body().clone());
    *cloned.method_mut() = request.method().clone();
    *cloned.uri_mut() = request.uri().clone();
    *cloned.version_mut() = request.version();
    *cloned.headers_mut() = request.headers().clone();
    *cloned.extensions_mut() = request.extensions().clone();
    cloned
}

fn text_response<B: From<&'static str>>(status: StatusCode, body: &'static str) -> Response<B> {
    let mut response = Response::new(B::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tower::service_fn;

    type Handler = tower::util::BoxCloneService<Request<String>, Response<String>, Infallible>;

    /// A handler answering with `statuses[n]` on call `n` (last one repeats).
    fn scripted(statuses: &'static [u16], calls: Arc<AtomicU32>) -> Handler {
        tower::util::BoxCloneService::new(service_fn(move |req: Request<String>| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
                let status = statuses[n.min(statuses.len() - 1)];
                let mut response = Response::new(format!("{} {}", req.uri().path(), n));
                *response.status_mut() = StatusCode::from_u16(status).unwrap();
                Ok::<_, Infallible>(response)
            }
        }))
    }

    fn policy(max_retries: u32) -> RetryPolicy<HttpError> {
        RetryPolicy::fixed(Duration::from_millis(1))
            .with_max_retries(max_retries)
            .with_retryable_status_codes([500])
    }

    fn get(path: &str) -> Request<String> {
        Request::get(path).body(String::new()).unwrap()
    }

    #[tokio::test]
    async fn test_always_500_becomes_503() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = wrap(policy(3), scripted(&[500], calls.clone()));

        let response = service.oneshot(get("/data")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body(), EXHAUSTED_BODY);
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
        assert_eq!(response.headers()[X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_success_response_passes_through() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = wrap(policy(3), scripted(&[502, 201], calls.clone()));

        let response = service.oneshot(get("/items")).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.body(), "/items 1");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = wrap(policy(3), scripted(&[404], calls.clone()));

        let response = service.oneshot(get("/missing")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_open_breaker_returns_429() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = wrap(
            policy(5).with_breaker_threshold(2),
            scripted(&[500], calls.clone()),
        );

        let response = service.oneshot(get("/data")).await.unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.body(), CIRCUIT_OPEN_BODY);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancellation_returns_500() {
        let calls = Arc::new(AtomicU32::new(0));
        let shutdown = CancellationToken::new();
        let layer = RetryLayer::new(
            RetryPolicy::fixed(Duration::from_secs(30))
                .with_max_retries(3)
                .with_retryable_status_codes([500]),
        )
        .with_cancellation(shutdown.clone());
        let service = layer.layer(scripted(&[500], calls.clone()));

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let response = service.oneshot(get("/data")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.body(), UNEXPECTED_BODY);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enforced_classification_rejects_unlisted_status() {
        let calls = Arc::new(AtomicU32::new(0));
        let service = wrap(
            policy(3).with_classification(crate::retry::Classification::Enforced),
            scripted(&[501], calls.clone()),
        );

        let response = service.oneshot(get("/data")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body(), NOT_RETRYABLE_BODY);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_inner_errors_are_returned_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let failing = service_fn({
            let calls = calls.clone();
            move |_req: Request<String>| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<Response<String>, _>("connection reset") }
            }
        });

        let result = wrap(policy(3), failing).oneshot(get("/data")).await;

        assert_eq!(result.unwrap_err(), "connection reset");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_readied_capacity_serves_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let limited = tower::limit::ConcurrencyLimit::new(scripted(&[500, 200], calls.clone()), 1);
        let mut service = wrap(policy(3), limited);

        let response = tokio::time::timeout(Duration::from_secs(2), async {
            service.ready().await?.call(get("/data")).await
        })
        .await
        .expect("request should not wait on capacity held by the middleware")
        .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // the swapped-in handle must be usable for the next request
        let response = tokio::time::timeout(Duration::from_secs(2), async {
            service.ready().await?.call(get("/data")).await
        })
        .await
        .expect("second request should acquire capacity")
        .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_clone_request_copies_parts() {
        let mut request = Request::post("/submit?x=1")
            .header("x-request-id", "abc")
            .body("payload".to_string())
            .unwrap();
        request.extensions_mut().insert(7u8);

        let cloned = clone_request(&request);

        assert_eq!(cloned.method(), &http::Method::POST);
        assert_eq!(cloned.uri(), "/submit?x=1");
        assert_eq!(cloned.headers()["x-request-id"], "abc");
        assert_eq!(cloned.extensions().get::<u8>(), Some(&7));
        assert_eq!(cloned.body(), "payload");
    }

    #[test]
    fn test_layer_exposes_policy() {
        let layer = RetryLayer::new(policy(4));
        assert_eq!(layer.policy().max_retries(), 4);
    }
}
