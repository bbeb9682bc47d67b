//! 内置的迁移拓扑：单体、电影服务、事件服务，以及它们之间的路由和服务组。

use super::model::{Config, EndpointConfig, GatewaySettings, RouteMethods, Protocol, RouteConfig};
use std::collections::BTreeMap;

const ALL_API_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH"];
const CATCH_ALL_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];

pub const MONOLITH_SERVICE: &str = "monolith-service";
pub const MOVIES_SERVICE: &str = "movies-service";
pub const EVENTS_SERVICE: &str = "events-service";

const HEALTH_ROUTE_TIMEOUT_MS: u64 = 5_000;

impl Config {
    /// 根据运行时设置生成内置的端点、路由和服务组
    ///
    /// 单体权重为 `100 - percent`，电影服务权重为 `percent`，
    /// 所以迁移比例直接决定 `movies-load-balanced` 组内的流量分配。
    pub fn from_settings(settings: GatewaySettings) -> Self {
        let percent = u32::from(settings.migration.percent.min(100));
        let upstreams = &settings.upstreams;

        let endpoints = vec![
            EndpointConfig {
                service_name: MONOLITH_SERVICE.to_string(),
                host: upstreams.monolith.host.clone(),
                port: upstreams.monolith.port,
                protocol: Protocol::Http,
                health_check_path: "/health".to_string(),
                weight: 100 - percent,
            },
            EndpointConfig {
                service_name: MOVIES_SERVICE.to_string(),
                host: upstreams.movies.host.clone(),
                port: upstreams.movies.port,
                protocol: Protocol::Http,
                health_check_path: "/api/movies".to_string(),
                weight: percent,
            },
            EndpointConfig {
                service_name: EVENTS_SERVICE.to_string(),
                host: upstreams.events.host.clone(),
                port: upstreams.events.port,
                protocol: Protocol::Http,
                health_check_path: "/health".to_string(),
                weight: 100,
            },
        ];

        let routes = vec![
            // 未写超时的路由使用 REQUEST_TIMEOUT
            route("/api/movies", ALL_API_METHODS.into(), &settings.migration.group, None, 3),
            route("/api/events", ALL_API_METHODS.into(), EVENTS_SERVICE, None, 3),
            route("/health", "GET".into(), MONOLITH_SERVICE, Some(HEALTH_ROUTE_TIMEOUT_MS), 1),
            route("/api/health", "GET".into(), MONOLITH_SERVICE, Some(HEALTH_ROUTE_TIMEOUT_MS), 1),
            route("/", CATCH_ALL_METHODS.into(), MONOLITH_SERVICE, None, 3),
        ];

        let mut service_groups = BTreeMap::new();
        service_groups.insert(
            settings.migration.group.clone(),
            vec![
                settings.migration.legacy_service.clone(),
                settings.migration.new_service.clone(),
            ],
        );
        for name in [MONOLITH_SERVICE, MOVIES_SERVICE, EVENTS_SERVICE] {
            service_groups.insert(name.to_string(), vec![name.to_string()]);
        }

        Config {
            settings,
            endpoints,
            routes,
            service_groups,
        }
    }
}

fn route(path: &str, method: RouteMethods, service_name: &str, timeout_ms: Option<u64>, retries: u32) -> RouteConfig {
    RouteConfig {
        path: path.to_string(),
        method,
        service_name: service_name.to_string(),
        strip_path: false,
        preserve_host: false,
        timeout_ms,
        retries,
    }
}
