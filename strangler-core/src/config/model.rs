use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

/// 网关完整配置
///
/// `settings` 来自环境变量（可选 TOML 文件打底），
/// `endpoints`、`routes`、`service_groups` 是编译期内置的迁移拓扑，见 [`super::defaults`]。
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub settings: GatewaySettings,
    pub endpoints: Vec<EndpointConfig>,
    pub routes: Vec<RouteConfig>,
    #[serde(default)]
    pub service_groups: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GatewaySettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// 未显式配置超时的路由使用的单次尝试超时（毫秒）
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// 健康检查间隔（毫秒），小于等于 0 表示关闭
    #[serde(default = "default_health_check_interval_ms")]
    pub health_check_interval_ms: i64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub balancer_mode: BalancerMode,
    #[serde(default)]
    pub migration: MigrationSettings,
    #[serde(default)]
    pub upstreams: UpstreamSettings,
}

/// 负载均衡模式
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BalancerMode {
    /// 按权重交错的选择序列，感知健康状态
    #[default]
    Weighted,
    /// 计数器取模的灰度迁移，不感知健康状态、不重试
    Counter,
}

impl std::str::FromStr for BalancerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weighted" => Ok(BalancerMode::Weighted),
            "counter" => Ok(BalancerMode::Counter),
            other => Err(format!("unknown balancer mode '{}'", other)),
        }
    }
}

/// 灰度迁移配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MigrationSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 新服务承接的流量百分比
    #[serde(default = "default_migration_percent")]
    pub percent: u8,
    #[serde(default = "default_legacy_service")]
    pub legacy_service: String,
    #[serde(default = "default_new_service")]
    pub new_service: String,
    /// 承载迁移流量的服务组
    #[serde(default = "default_migration_group")]
    pub group: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpstreamSettings {
    #[serde(default = "default_monolith_upstream")]
    pub monolith: UpstreamAddress,
    #[serde(default = "default_movies_upstream")]
    pub movies: UpstreamAddress,
    #[serde(default = "default_events_upstream")]
    pub events: UpstreamAddress,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct UpstreamAddress {
    pub host: String,
    pub port: u16,
}

impl UpstreamAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 物理后端配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EndpointConfig {
    pub service_name: String,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
    /// 组内相对权重，0-100
    pub weight: u32,
}

/// 路由方法，可以是单个方法或方法列表
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RouteMethods {
    Single(String),
    Multiple(Vec<String>),
}

impl RouteMethods {
    pub fn as_slice(&self) -> &[String] {
        match self {
            RouteMethods::Single(method) => std::slice::from_ref(method),
            RouteMethods::Multiple(methods) => methods,
        }
    }
}

impl From<&str> for RouteMethods {
    fn from(method: &str) -> Self {
        RouteMethods::Single(method.to_string())
    }
}

impl From<&[&str]> for RouteMethods {
    fn from(methods: &[&str]) -> Self {
        RouteMethods::Multiple(methods.iter().map(|m| m.to_string()).collect())
    }
}

/// 路由配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RouteConfig {
    pub path: String,
    pub method: RouteMethods,
    pub service_name: String,
    #[serde(default)]
    pub strip_path: bool,
    #[serde(default)]
    pub preserve_host: bool,
    /// 单次尝试超时（毫秒），缺省时使用全局 request_timeout_ms
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default = "default_route_retries")]
    pub retries: u32,
}

impl RouteConfig {
    /// 去掉尾部斜杠后为空即为兜底路由，"/" 和 "//" 等价
    pub fn is_catch_all(&self) -> bool {
        self.path.trim_end_matches('/').is_empty()
    }
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            request_timeout_ms: default_request_timeout_ms(),
            health_check_interval_ms: default_health_check_interval_ms(),
            log_level: default_log_level(),
            balancer_mode: BalancerMode::default(),
            migration: MigrationSettings::default(),
            upstreams: UpstreamSettings::default(),
        }
    }
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            percent: default_migration_percent(),
            legacy_service: default_legacy_service(),
            new_service: default_new_service(),
            group: default_migration_group(),
        }
    }
}

impl Default for UpstreamSettings {
    fn default() -> Self {
        Self {
            monolith: default_monolith_upstream(),
            movies: default_movies_upstream(),
            events: default_events_upstream(),
        }
    }
}

impl GatewaySettings {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// 迁移开关只在计数模式下生效，加权模式只看迁移百分比
    pub fn migration_toggle_effective(&self) -> bool {
        self.balancer_mode == BalancerMode::Counter
    }

    /// 健康检查间隔，关闭时返回 None
    pub fn health_check_interval(&self) -> Option<Duration> {
        u64::try_from(self.health_check_interval_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}

impl Config {
    pub fn find_endpoint(&self, service_name: &str) -> Option<&EndpointConfig> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.service_name == service_name)
    }

    /// 验证配置的有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.port == 0 {
            return Err(ConfigError::Invalid("port must be between 1 and 65535".into()));
        }

        if self.settings.migration.percent > 100 {
            return Err(ConfigError::Invalid(format!(
                "migration percent must be between 0 and 100, got {}",
                self.settings.migration.percent
            )));
        }

        if self.endpoints.is_empty() {
            return Err(ConfigError::Invalid("at least one endpoint is required".into()));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            if endpoint.host.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}' has an empty host",
                    endpoint.service_name
                )));
            }
            if endpoint.port == 0 {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}' has port 0",
                    endpoint.service_name
                )));
            }
            if endpoint.weight > 100 {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}' weight must be between 0 and 100, got {}",
                    endpoint.service_name, endpoint.weight
                )));
            }
            if !endpoint.health_check_path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "endpoint '{}' health check path must start with '/'",
                    endpoint.service_name
                )));
            }
            if !seen.insert((&endpoint.service_name, &endpoint.host, endpoint.port)) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint {}@{}:{}",
                    endpoint.service_name, endpoint.host, endpoint.port
                )));
            }
        }

        for (group, members) in &self.service_groups {
            if members.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "service group '{}' has no members",
                    group
                )));
            }
            for member in members {
                if self.find_endpoint(member).is_none() {
                    return Err(ConfigError::Invalid(format!(
                        "service group '{}' references unknown service '{}'",
                        group, member
                    )));
                }
            }
        }

        if self.routes.is_empty() {
            return Err(ConfigError::Invalid("at least one route is required".into()));
        }

        for (index, route) in self.routes.iter().enumerate() {
            if !route.path.starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "route path '{}' must start with '/'",
                    route.path
                )));
            }
            if route.is_catch_all() && index + 1 != self.routes.len() {
                return Err(ConfigError::Invalid(
                    "catch-all route '/' must be the last route".into(),
                ));
            }
            if route.method.as_slice().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "route '{}' has no methods",
                    route.path
                )));
            }
            if route.timeout_ms == Some(0) {
                return Err(ConfigError::Invalid(format!(
                    "route '{}' timeout must be greater than 0",
                    route.path
                )));
            }
            if route.service_name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "route '{}' has an empty service name",
                    route.path
                )));
            }
        }

        Ok(())
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3200
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_health_check_interval_ms() -> i64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_migration_percent() -> u8 {
    50
}

fn default_legacy_service() -> String {
    "monolith-service".to_string()
}

fn default_new_service() -> String {
    "movies-service".to_string()
}

fn default_migration_group() -> String {
    "movies-load-balanced".to_string()
}

fn default_monolith_upstream() -> UpstreamAddress {
    UpstreamAddress::new("monolith", 3280)
}

fn default_movies_upstream() -> UpstreamAddress {
    UpstreamAddress::new("movies-service", 3281)
}

fn default_events_upstream() -> UpstreamAddress {
    UpstreamAddress::new("events-service", 3282)
}

fn default_health_check_path() -> String {
    "/health".to_string()
}

fn default_route_retries() -> u32 {
    3
}
