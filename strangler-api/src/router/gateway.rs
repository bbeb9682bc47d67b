use crate::app::AppState;
use axum::{extract::State, response::Json};
use serde::Serialize;
use serde_json::{json, Value};
use strangler_core::GATEWAY_ID;

/// 网关自身存活检查，不探测任何上游
pub async fn gateway_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": GATEWAY_ID,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.uptime().as_secs_f64(),
    }))
}

#[derive(Debug, Serialize)]
struct RouteSummary<'a> {
    path: &'a str,
    methods: Vec<&'a str>,
    service_name: &'a str,
    strip_path: bool,
    preserve_host: bool,
    timeout_ms: u128,
    retries: u32,
}

/// 路由、迁移配置、端点健康和各服务组选择器状态
pub async fn gateway_stats(State(state): State<AppState>) -> Json<Value> {
    let settings = &state.config.settings;
    let routes: Vec<RouteSummary> = state
        .handler
        .matcher()
        .routes()
        .iter()
        .map(|route| RouteSummary {
            path: &route.path,
            methods: route.methods.iter().map(|m| m.as_str()).collect(),
            service_name: &route.service_name,
            strip_path: route.strip_path,
            preserve_host: route.preserve_host,
            timeout_ms: route.timeout.as_millis(),
            retries: route.retries,
        })
        .collect();

    Json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.uptime().as_secs_f64(),
        "balancer_mode": settings.balancer_mode,
        "migration": settings.migration,
        "migration_toggle_effective": settings.migration_toggle_effective(),
        "health": state.load_balancer.get_service_health(),
        "endpoints": state.load_balancer.endpoint_snapshots(),
        "groups": state.load_balancer.group_stats(),
        "routes": routes,
    }))
}
