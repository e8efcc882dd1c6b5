//! Per-request unit of work with transparent retry on write conflicts.

use std::error::Error as StdError;

use async_trait::async_trait;
use axum::{
    body::{self, Bytes},
    extract::Request,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::app::RetryPolicy;
use crate::domain::{AppError, LedgerStore, UnitOfWork, ValidationError};

use super::buffered::BufferedResponse;

/// A handler whose store work runs inside one unit of work per attempt
#[async_trait]
pub trait TransactionalHandler: Send + Sync {
    type Input: Send + Sync;

    /// Decode the request body. Runs before the unit of work is opened and
    /// must not touch the store; a failure here ends the request.
    fn parse(&self, body: &[u8]) -> Result<Self::Input, AppError>;

    /// Do the store work through `uow` and record the outcome
    async fn handle(&self, input: &Self::Input, uow: &mut dyn UnitOfWork) -> BufferedResponse;
}

/// Run `handler` for `request`, retrying attempts that lose a write conflict.
///
/// The body is read once and replayed to every attempt. Each attempt gets its
/// own unit of work, committed when the handler recorded success and aborted
/// otherwise. Exactly one response leaves this function: the one recorded by
/// the terminal attempt.
pub async fn run_with_retry<H>(
    store: &dyn LedgerStore,
    policy: &RetryPolicy,
    request: Request,
    handler: &H,
) -> Response
where
    H: TransactionalHandler,
{
    let deadline = Instant::now() + policy.deadline;

    // Size is bounded by the router's body limit layer
    let body = match body::to_bytes(request.into_body(), usize::MAX).await {
        Ok(body) => body,
        Err(e) if exceeds_length_limit(&e) => {
            return AppError::Validation(ValidationError::BodyTooLarge(e.to_string()))
                .into_response();
        }
        Err(e) => {
            return AppError::Validation(ValidationError::MalformedBody(format!(
                "failed to read body: {e}"
            )))
            .into_response();
        }
    };

    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let outcome = run_attempt(store, handler, body.clone()).await;

        if !outcome.is_conflict() {
            return outcome.into_response();
        }
        if attempt >= policy.max_attempts {
            warn!(
                attempts = attempt,
                "Giving up after write conflicts, retry budget exhausted"
            );
            return outcome.into_response();
        }
        if Instant::now() >= deadline {
            warn!(
                attempts = attempt,
                "Giving up after write conflict, request deadline elapsed"
            );
            return outcome.into_response();
        }
        debug!(
            attempt,
            max_attempts = policy.max_attempts,
            error = ?outcome.recorded_error(),
            "Retrying request after write conflict"
        );
    }
}

/// Whether a body read failed because the body limit layer cut the stream off.
///
/// Bodies without a `Content-Length` are only caught while streaming, and the
/// [`LengthLimitError`] arrives wrapped in one or more `axum::Error`s.
fn exceeds_length_limit(err: &(dyn StdError + 'static)) -> bool {
    std::iter::successors(Some(err), |&e| e.source()).any(|e| e.is::<LengthLimitError>())
}

/// One attempt: begin, run the handler, then commit or abort.
///
/// The unit of work is owned by this function, so every way out of it,
/// including the future being dropped, ends the unit of work.
async fn run_attempt<H>(store: &dyn LedgerStore, handler: &H, body: Bytes) -> BufferedResponse
where
    H: TransactionalHandler,
{
    let input = match handler.parse(&body) {
        Ok(input) => input,
        Err(e) => return BufferedResponse::error(e),
    };

    let mut uow = match store.begin().await {
        Ok(uow) => uow,
        Err(e) => {
            return BufferedResponse::error(AppError::Internal(format!(
                "failed to begin unit of work: {e}"
            )));
        }
    };

    let outcome = handler.handle(&input, uow.as_mut()).await;
    if outcome.is_error() {
        if let Err(e) = uow.abort().await {
            warn!(error = %e, "Failed to abort unit of work");
        }
        return outcome;
    }

    match uow.commit().await {
        Ok(()) => outcome,
        Err(e) => BufferedResponse::error(e),
    }
}
