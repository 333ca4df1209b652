//! Axum middleware adapter.
//!
//! Bridges the framework request to a [`GuardRequest`], runs the chain, and
//! either forwards with the principal attached to request extensions or
//! responds with the mapped status and JSON error body.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::pipeline::{Decision, Guard};
use crate::request::GuardRequest;

/// Run the access guard in front of the inner service.
///
/// Install with `axum::middleware::from_fn_with_state(guard, require_access)`.
/// The rate-limit client key is the raw remote address from `ConnectInfo`
/// when available.
pub async fn require_access(
    State(guard): State<Arc<Guard>>,
    mut request: Request,
    next: Next,
) -> Response {
    let client_key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let authorization = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let guard_request = GuardRequest::new(
        request.method().as_str(),
        request.uri().path(),
        authorization,
        client_key,
    );

    match guard.evaluate(guard_request).await {
        Decision::Forward(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        Decision::Reject { status, body } => {
            let status =
                StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(body)).into_response()
        }
    }
}
