//! Request middleware: global rate limit, body-limit rendering and
//! request logging.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
};

use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Rate limiting
// ─────────────────────────────────────────────────────────────────────────────

/// One limiter shared by every client.
pub type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Quota used when `api_rpm` is zero.
const FALLBACK_RPM: NonZeroU32 = NonZeroU32::MIN.saturating_add(59);

/// Build a limiter allowing `rpm` requests per minute, bursting up to `rpm`.
pub fn create_rate_limiter(rpm: u32) -> SharedRateLimiter {
    let rpm = NonZeroU32::new(rpm).unwrap_or(FALLBACK_RPM);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

/// Answer `429` with `Retry-After` once the quota is spent.
///
/// A no-op when the state carries no limiter.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = &state.limiter else {
        return next.run(request).await;
    };

    let Err(not_until) = limiter.check() else {
        return next.run(request).await;
    };

    let wait = not_until.wait_time_from(DefaultClock::default().now());
    let retry_after = retry_after_secs(wait);
    tracing::warn!(
        path = %request.uri().path(),
        retry_after_seconds = retry_after,
        "Rate limit exceeded"
    );

    let mut response = ServerError::RateLimitExceeded.into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
    response
}

/// Whole seconds to wait, never less than one.
fn retry_after_secs(wait: Duration) -> u64 {
    wait.as_secs_f64().ceil().max(1.0) as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Body limit
// ─────────────────────────────────────────────────────────────────────────────

/// Replace the body extractor's bare `413` with a [`ServerError`] body that
/// names the configured limit.
pub async fn payload_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    ServerError::PayloadTooLarge {
        limit: state.config.max_body_size,
    }
    .into_response()
}

// ─────────────────────────────────────────────────────────────────────────────
// Request logging
// ─────────────────────────────────────────────────────────────────────────────

/// Log one line per request once the response head is ready; streamed
/// `/exec` bodies may still be in flight. Level follows the status class.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;
    log_completion(&method, &path, response.status(), started.elapsed());
    response
}

fn log_completion(method: &Method, path: &str, status: StatusCode, elapsed: Duration) {
    let status_code = status.as_u16();
    let duration_ms = elapsed.as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(%method, path, status = status_code, duration_ms, "Request failed");
    } else if status.is_client_error() {
        tracing::warn!(%method, path, status = status_code, duration_ms, "Request rejected");
    } else {
        tracing::info!(%method, path, status = status_code, duration_ms, "Request completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{Router, body::Body, middleware, routing::post};
    use sandpit_script::Interpreter;
    use tower::ServiceExt;

    fn state(config: ServerConfig) -> AppState {
        AppState::new(Interpreter::default(), config)
    }

    fn limited_router(state: AppState) -> Router {
        Router::new()
            .route("/exec", post(|| async { "ran" }))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                request_logging_middleware,
            ))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit_middleware,
            ))
            .with_state(state)
    }

    fn exec_request() -> Request {
        axum::http::Request::builder()
            .method(Method::POST)
            .uri("/exec")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_limiter_lets_everything_through() {
        let app = limited_router(state(ServerConfig::new().with_api_rpm(1)));

        for _ in 0..5 {
            let response = app.clone().oneshot(exec_request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_quota_exhaustion_sets_retry_after() {
        let config = ServerConfig::new().with_rate_limiting(true).with_api_rpm(1);
        let app = limited_router(state(config));

        let first = app.clone().oneshot(exec_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app.oneshot(exec_request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry: u64 = second.headers()[header::RETRY_AFTER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(retry >= 1);
    }

    #[tokio::test]
    async fn test_payload_limit_names_the_limit() {
        let state = state(ServerConfig::new().with_max_body_size(8));
        let app = Router::new()
            .route(
                "/exec",
                post(|| async { StatusCode::PAYLOAD_TOO_LARGE }),
            )
            .layer(middleware::from_fn_with_state(
                state.clone(),
                payload_limit_middleware,
            ))
            .with_state(state);

        let response = app.oneshot(exec_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"request body exceeds 8 bytes");
    }

    #[test]
    fn test_zero_rpm_uses_fallback() {
        assert_eq!(FALLBACK_RPM.get(), 60);
        assert!(create_rate_limiter(0).check().is_ok());
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1500)), 2);
        assert_eq!(retry_after_secs(Duration::from_secs(30)), 30);
    }
}
