//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json,
    extract::{Path, Request, State},
    http::StatusCode,
    response::Response,
};
use utoipa::OpenApi;

use crate::app::{AppState, LedgerService};
use crate::domain::{
    AppError, BalanceResponse, ErrorResponse, HealthResponse, PaymentRequest, UnitOfWork,
};

use super::buffered::BufferedResponse;
use super::retry::{TransactionalHandler, run_with_retry};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Credit Ledger API",
        version = "0.1.0",
        description = "Records payment notifications as idempotent credits and reports balances",
        license(
            name = "MIT"
        )
    ),
    paths(
        payment_handler,
        balance_handler,
        health_check_handler,
    ),
    components(
        schemas(
            PaymentRequest,
            BalanceResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "payments", description = "Payment notification endpoints"),
        (name = "balances", description = "Balance queries"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Credits the account named in a payment notification
pub struct PaymentNotification;

#[async_trait]
impl TransactionalHandler for PaymentNotification {
    type Input = PaymentRequest;

    fn parse(&self, body: &[u8]) -> Result<PaymentRequest, AppError> {
        LedgerService::parse_payment(body)
    }

    async fn handle(&self, payment: &PaymentRequest, uow: &mut dyn UnitOfWork) -> BufferedResponse {
        BufferedResponse::from_result(
            LedgerService::apply_payment(uow, payment).await,
            StatusCode::NO_CONTENT,
        )
    }
}

/// Register an incoming payment
///
/// Credits `credits` to the account `sub`. The `txnID` makes the call
/// idempotent: repeating a notification that was already processed succeeds
/// without crediting again.
#[utoipa::path(
    post,
    path = "/payment",
    tag = "payments",
    request_body = PaymentRequest,
    responses(
        (status = 204, description = "Payment recorded, or already recorded earlier"),
        (status = 400, description = "Validation error", body = ErrorResponse),
        (status = 409, description = "Write conflicts persisted past the retry budget", body = ErrorResponse),
        (status = 413, description = "Request body too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn payment_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    run_with_retry(
        state.store.as_ref(),
        &state.retry_policy,
        request,
        &PaymentNotification,
    )
    .await
}

/// Current credit balance of an account
#[utoipa::path(
    get,
    path = "/balance/{sub}",
    tag = "balances",
    params(
        ("sub" = String, Path, description = "Subject identifier of the account")
    ),
    responses(
        (status = 200, description = "Balance of the account", body = BalanceResponse),
        (status = 400, description = "Invalid sub", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn balance_handler(
    State(state): State<Arc<AppState>>,
    Path(sub): Path<String>,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.service.user_balance(&sub).await?;
    Ok(Json(BalanceResponse { sub, balance }))
}

/// Health check
///
/// Always answers 200; `dbAlive` tells whether the store is reachable.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> BufferedResponse {
    BufferedResponse::json(StatusCode::OK, &state.service.health_check().await)
}

/// OpenAPI document
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
