use crate::app::AppState;
use crate::middleware::{response_time_middleware, X_RESPONSE_TIME};
use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    middleware,
    routing::get,
    Router,
};
use strangler_core::X_GATEWAY;
use strangler_relay::relay::client::headers::{X_SERVICE_ENDPOINT, X_SERVICE_NAME};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::{
    gateway::{gateway_health, gateway_stats},
    proxy::{proxy_request, MAX_BODY_BYTES},
};

/// 创建应用路由
///
/// `/gateway/*` 由网关自己处理，其余所有路径和方法都进入代理。
pub fn create_app_router(cors_enabled: bool) -> Router<AppState> {
    let router = Router::new()
        .route("/gateway/health", get(gateway_health))
        .route("/gateway/stats", get(gateway_stats));

    #[cfg(feature = "observability")]
    let router = router.route(
        "/gateway/metrics",
        get(crate::observability::prometheus_metrics_handler),
    );

    let router = router
        .fallback(proxy_request)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));
    let router = if cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    };

    router
        .layer(middleware::from_fn(response_time_middleware))
        .layer(TraceLayer::new_for_http())
}

/// 允许任意来源，并暴露网关自己的响应头
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(X_RESPONSE_TIME),
            HeaderName::from_static(X_SERVICE_NAME),
            HeaderName::from_static(X_SERVICE_ENDPOINT),
            HeaderName::from_static(X_GATEWAY),
        ])
}
