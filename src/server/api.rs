//! Order read API
//!
//! `GET /api/v1/order/{order_uid}` answers with `{"order": ...}`, or with
//! `{"error": ...}` and a 404/500 status.

use std::sync::Arc;
use std::time::Instant;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, Request, Response, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::respond;
use crate::domain::{HttpMetrics, Order, OrderService};

/// Route prefix for single-order lookups
pub const ORDER_PATH: &str = "/api/v1/order/";

const NOT_FOUND: &str = "not found";
const ORDER_NOT_FOUND: &str = "order not found";
const INTERNAL_ERROR: &str = "internal server error";
const METHOD_NOT_ALLOWED: &str = "method not allowed";

#[derive(Serialize)]
struct OrderResponse<'a> {
    order: &'a Order,
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: &'a str,
}

/// Shared state of the API handler
pub struct ApiState {
    service: Arc<dyn OrderService>,
    metrics: Arc<dyn HttpMetrics>,
    ctx: CancellationToken,
}

impl ApiState {
    /// `ctx` is the parent of every request's cancellation token.
    pub fn new(
        service: Arc<dyn OrderService>,
        metrics: Arc<dyn HttpMetrics>,
        ctx: CancellationToken,
    ) -> Self {
        Self {
            service,
            metrics,
            ctx,
        }
    }
}

/// Route and answer one request.
pub async fn handle<B>(state: Arc<ApiState>, req: Request<B>) -> Response<Full<Bytes>> {
    let Some(order_uid) = req.uri().path().strip_prefix(ORDER_PATH) else {
        return error_response(StatusCode::NOT_FOUND, NOT_FOUND);
    };

    if req.method() != Method::GET {
        let mut response = error_response(StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED);
        response
            .headers_mut()
            .insert(ALLOW, HeaderValue::from_static("GET"));
        return response;
    }

    if order_uid.is_empty() || order_uid.contains('/') {
        return error_response(StatusCode::NOT_FOUND, NOT_FOUND);
    }

    let start = Instant::now();
    state.metrics.inc_request();
    let response = get_order(&state, order_uid).await;
    state.metrics.observe_request(start);
    response
}

async fn get_order(state: &ApiState, order_uid: &str) -> Response<Full<Bytes>> {
    let ctx = state.ctx.child_token();

    match state.service.get_order(&ctx, order_uid).await {
        Ok(order) => match serde_json::to_vec(&OrderResponse { order: &order }) {
            Ok(body) => respond(StatusCode::OK, "application/json", body),
            Err(e) => {
                error!(order_uid = %order_uid, error = %e, "Failed to encode order");
                error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
            }
        },
        Err(e) if e.is_not_found() => {
            debug!(order_uid = %order_uid, "Order not found");
            error_response(StatusCode::NOT_FOUND, ORDER_NOT_FOUND)
        }
        Err(e) => {
            error!(order_uid = %order_uid, error = %e, "Failed to get order");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR)
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(&ErrorResponse { error: message }).unwrap_or_default();
    respond(status, "application/json", body)
}
