use crate::app::AppState;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use std::net::SocketAddr;
use strangler_core::{GATEWAY_ID, X_GATEWAY};
use strangler_relay::ProxyRequest;

/// 缓冲到内存的请求体上限
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// 代理入口：网关自己的路由之外的所有请求
pub async fn proxy_request(State(state): State<AppState>, request: Request) -> Response {
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let method = request.method().clone();
    let uri = request.uri().clone();
    let headers = request.headers().clone();

    // 上限由路由上的 DefaultBodyLimit 决定，超限是 413，其余读取失败是 400
    let body = match Bytes::from_request(request, &state).await {
        Ok(body) => body,
        Err(rejection) => {
            let status = rejection.status();
            tracing::warn!("Failed to read body of {} {}: {}", method, uri.path(), rejection.body_text());
            let error = if status == StatusCode::PAYLOAD_TOO_LARGE {
                "Request body too large"
            } else {
                "Invalid request body"
            };
            return (
                status,
                [(X_GATEWAY, GATEWAY_ID)],
                Json(json!({
                    "error": error,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                })),
            )
                .into_response();
        }
    };

    let proxy_request = ProxyRequest::new(method, uri.path())
        .with_query(uri.query().map(str::to_string))
        .with_headers(headers)
        .with_body(body)
        .with_client_ip(client_ip);

    match state.handler.handle(proxy_request).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}
