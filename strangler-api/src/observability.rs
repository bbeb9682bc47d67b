//! Prometheus metrics for the gateway
//!
//! Only compiled with the `observability` feature.

use crate::app::AppState;
use ::prometheus::{CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;
use strangler_relay::relay::client::headers::X_SERVICE_NAME;

const NAMESPACE: &str = "strangler_gateway";

/// Prometheus metrics collector
#[derive(Clone)]
pub struct PrometheusMetrics {
    pub registry: Arc<Registry>,
    pub http_requests_total: CounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub endpoint_health_status: GaugeVec,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, ::prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let http_requests_total = CounterVec::new(
            Opts::new("http_requests_total", "Total number of requests handled by the gateway")
                .namespace(NAMESPACE),
            &["method", "service", "status"],
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "Request duration in seconds")
                .namespace(NAMESPACE),
            &["method", "service"],
        )?;

        let endpoint_health_status = GaugeVec::new(
            Opts::new(
                "endpoint_health_status",
                "Health status of upstream endpoints (1 = healthy, 0 = unhealthy)",
            )
            .namespace(NAMESPACE),
            &["endpoint"],
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(endpoint_health_status.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration_seconds,
            endpoint_health_status,
        })
    }

    /// 抓取前刷新端点健康度
    pub fn refresh_endpoint_health(&self, state: &AppState) {
        for snapshot in state.load_balancer.endpoint_snapshots() {
            let value = if snapshot.is_healthy { 1.0 } else { 0.0 };
            let label = format!("{}@{}", snapshot.service_name, snapshot.address);
            self.endpoint_health_status
                .with_label_values(&[label.as_str()])
                .set(value);
        }
    }

    pub fn render(&self) -> Result<String, ::prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

/// 按方法、服务和状态码计数，服务名取自响应的 `x-service-name`
pub async fn metrics_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    if let Some(metrics) = &state.prometheus_metrics {
        let service = response
            .headers()
            .get(X_SERVICE_NAME)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("gateway")
            .to_string();
        let status = response.status().as_u16().to_string();

        metrics
            .http_requests_total
            .with_label_values(&[method.as_str(), service.as_str(), status.as_str()])
            .inc();
        metrics
            .http_request_duration_seconds
            .with_label_values(&[method.as_str(), service.as_str()])
            .observe(start_time.elapsed().as_secs_f64());
    }

    response
}

pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> Response {
    let Some(metrics) = &state.prometheus_metrics else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Prometheus metrics not initialized").into_response();
    };

    metrics.refresh_endpoint_health(&state);
    match metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics").into_response()
        }
    }
}
