use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub const X_RESPONSE_TIME: &str = "x-response-time";

/// 为每个响应加上 `X-Response-Time: <n>ms`
pub async fn response_time_middleware(request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let mut response = next.run(request).await;

    let elapsed_ms = start_time.elapsed().as_millis();
    if let Ok(value) = HeaderValue::from_str(&format!("{}ms", elapsed_ms)) {
        response.headers_mut().insert(X_RESPONSE_TIME, value);
    }

    tracing::debug!("{} {} -> {} in {}ms", method, path, response.status(), elapsed_ms);
    response
}
