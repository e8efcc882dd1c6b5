//! Router construction.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    BoxError, Router,
    error_handling::HandleErrorLayer,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower::timeout::{TimeoutLayer, error::Elapsed};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app::AppState;
use crate::domain::AppError;

use super::handlers::{balance_handler, health_check_handler, openapi_handler, payment_handler};

/// Slack on top of the retry deadline before an in-flight attempt is cut off
const REQUEST_TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Build the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let request_timeout = state.retry_policy.deadline + REQUEST_TIMEOUT_GRACE;
    let max_body_bytes = state.max_body_bytes;

    let routes = Router::new()
        .route("/payment", post(payment_handler))
        .route("/balance/{sub}", get(balance_handler))
        .route("/health", get(health_check_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .layer(RequestBodyLimitLayer::new(max_body_bytes));

    with_request_timeout(routes, request_timeout)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cut requests off after `timeout`, answering with the usual error body
fn with_request_timeout<S>(router: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                middleware_error(err, timeout)
            }))
            .layer(TimeoutLayer::new(timeout)),
    )
}

fn middleware_error(err: BoxError, timeout: Duration) -> AppError {
    if err.is::<Elapsed>() {
        AppError::Timeout(timeout)
    } else {
        AppError::Internal(format!("unhandled middleware error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorResponse;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use axum::response::IntoResponse;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_slow_request_gets_json_timeout_body() {
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                "late"
            }),
        );
        let router = with_request_timeout(slow, Duration::from_millis(20));

        let request = Request::builder().uri("/slow").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let error: ErrorResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(error.message, "Request timed out after 20ms");
    }

    #[tokio::test]
    async fn test_fast_request_passes_through() {
        let fast = Router::new().route("/fast", get(|| async { "ok" }));
        let router = with_request_timeout(fast, Duration::from_secs(5));

        let request = Request::builder().uri("/fast").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_other_middleware_errors_are_internal() {
        let err: BoxError = "boom".into();
        let response = middleware_error(err, Duration::from_secs(15)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
